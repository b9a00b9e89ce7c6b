use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};
use url::Url;

static YOUTUBE_ID_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").expect("Invalid video id regex"));

/// Hex characters kept from the digest of inputs that are not YouTube links
const HASH_ID_LENGTH: usize = 16;

/// Whether `candidate` looks like a YouTube video id
pub fn is_youtube_id(candidate: &str) -> bool {
    YOUTUBE_ID_REGEX.is_match(candidate)
}

/// Derive a stable identifier for a video from a URL or an id.
///
/// YouTube watch, short, embed and `youtu.be` links yield the video id; a bare
/// 11-character id is kept as is. Anything else hashes to a fixed-length hex
/// prefix so the same input always maps to the same session.
pub fn derive_video_id(input: &str) -> String {
    let input = input.trim();

    if is_youtube_id(input) {
        return input.to_string();
    }

    if let Some(id) = parse_url(input).as_ref().and_then(youtube_id_from_url) {
        return id;
    }

    let digest = Sha256::digest(input.as_bytes());
    let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
    debug!("No YouTube id in '{}', using content hash", input);
    hex[..HASH_ID_LENGTH].to_string()
}

fn parse_url(input: &str) -> Option<Url> {
    match Url::parse(input) {
        Ok(url) => Some(url),
        Err(_) if input.contains('.') && !input.contains(char::is_whitespace) => {
            Url::parse(&format!("https://{}", input)).ok()
        }
        Err(_) => None,
    }
}

fn youtube_id_from_url(url: &Url) -> Option<String> {
    let host = url.host_str()?.trim_start_matches("www.").trim_start_matches("m.");
    let mut segments = url.path_segments()?.filter(|s| !s.is_empty());

    let candidate = match host {
        "youtu.be" => segments.next().map(str::to_string),
        "youtube.com" | "music.youtube.com" | "youtube-nocookie.com" => {
            match segments.next() {
                Some("watch") | None => url
                    .query_pairs()
                    .find(|(key, _)| key == "v")
                    .map(|(_, value)| value.into_owned()),
                Some("shorts" | "embed" | "live" | "v") => segments.next().map(str::to_string),
                Some(_) => None,
            }
        }
        _ => None,
    }?;

    is_youtube_id(&candidate).then_some(candidate)
}
