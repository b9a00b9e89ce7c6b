/*!
 * Tests for caption merging
 */

use dualsub::subtitle_merger::{
    merge, MergeConfig, RawCue, SubtitleGroup, SubtitleMerger, MAX_GROUP_DURATION_MS, MAX_TEXT_LENGTH,
};

use crate::common::sample_cues;

/// A long, irregular caption stream: varied gaps, lengths and overlaps
fn noisy_cues() -> Vec<RawCue> {
    let words = ["alpha", "beta", "gamma", "delta", "epsilon", "zeta", "eta", "theta"];
    let mut cues = Vec::new();
    let mut start = 0u64;

    for i in 0..200u64 {
        let len = 1 + (i * 7 % 9) as usize;
        let text = (0..len)
            .map(|j| words[(i as usize + j) % words.len()])
            .collect::<Vec<_>>()
            .join(" ");
        let duration = 500 + (i * 373 % 4000);
        cues.push(RawCue::new(start, duration, text));
        // Mostly short steps, sometimes a long silence
        start += if i % 17 == 0 { 12_000 } else { 300 + i * 131 % 2500 };
    }
    cues
}

#[test]
fn test_merge_withCloseCues_shouldJoinIntoOneGroup() {
    let groups = merge(&[RawCue::new(0, 2000, "hello"), RawCue::new(2500, 1500, "world")]);

    assert_eq!(groups, vec![SubtitleGroup::new(0, 4000, "hello world")]);
}

#[test]
fn test_merge_withLongGap_shouldSplitGroups() {
    let groups = merge(&[RawCue::new(0, 2000, "hello"), RawCue::new(12_000, 1500, "world")]);

    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0].text, "hello");
    assert_eq!(groups[1].start_time_ms, 12_000);
}

#[test]
fn test_merge_withEmptyInput_shouldReturnNothing() {
    assert!(merge(&[]).is_empty());
}

#[test]
fn test_merge_withLecture_shouldGroupBySilence() {
    let groups = merge(&sample_cues());

    let texts: Vec<&str> = groups.iter().map(|g| g.text.as_str()).collect();
    assert_eq!(
        texts,
        vec![
            "so today we are going to talk about ownership in Rust",
            "first, the stack and then the heap",
            "any questions?",
        ]
    );
}

#[test]
fn test_merge_withNoisyStream_shouldRespectGroupLimits() {
    let groups = merge(&noisy_cues());

    assert!(!groups.is_empty());
    for group in &groups {
        assert!(group.start_time_ms <= group.end_time_ms);
        assert!(group.text_len() <= MAX_TEXT_LENGTH, "too long: {}", group.text);
        assert!(group.duration_ms() <= MAX_GROUP_DURATION_MS);
    }
}

#[test]
fn test_merge_withNoisyStream_shouldBeOrderedAndNonOverlapping() {
    let groups = merge(&noisy_cues());

    for pair in groups.windows(2) {
        assert!(pair[0].start_time_ms <= pair[1].start_time_ms);
        assert!(pair[0].end_time_ms <= pair[1].start_time_ms);
    }
}

#[test]
fn test_merge_twice_shouldBeDeterministic() {
    let cues = noisy_cues();
    assert_eq!(merge(&cues), merge(&cues));
}

#[test]
fn test_merge_shouldKeepEveryWord() {
    let cues = noisy_cues();
    let source_words: usize = cues.iter().map(|c| c.text.split_whitespace().count()).sum();
    let merged_words: usize = merge(&cues).iter().map(|g| g.text.split_whitespace().count()).sum();

    assert_eq!(source_words, merged_words);
}

#[test]
fn test_merge_withMalformedCues_shouldSkipThem() {
    let cues: Vec<RawCue> = serde_json::from_str(
        r#"[
            {"start": 0, "dur": "1500", "text": "first"},
            {"start": "oops", "duration": 100, "text": "broken"},
            {"duration": 100, "text": "no start"},
            {"start": 1600, "duration": -5, "text": "negative"},
            {"start": 1700, "duration": 800, "text": "  \n "},
            {"start": 2000, "duration": 1000, "text": "second\nline"}
        ]"#,
    )
    .unwrap();

    let groups = merge(&cues);

    assert_eq!(groups, vec![SubtitleGroup::new(0, 3000, "first second line")]);
}

#[test]
fn test_merge_withSecondBasedCues_shouldScale() {
    let cues: Vec<RawCue> = serde_json::from_str(r#"[{"start": 1.5, "dur": 2, "text": "hi"}]"#).unwrap();
    let cues: Vec<RawCue> = cues.into_iter().map(|c| c.scaled(1000.0)).collect();

    assert_eq!(merge(&cues), vec![SubtitleGroup::new(1500, 3500, "hi")]);
}

#[test]
fn test_merger_withCustomLimits_shouldUseThem() {
    let merger = SubtitleMerger::new(MergeConfig {
        max_gap_ms: 100,
        ..MergeConfig::default()
    });

    let groups = merger.merge(&[RawCue::new(0, 1000, "a"), RawCue::new(1500, 1000, "b")]);

    assert_eq!(groups.len(), 2);
}

#[test]
fn test_merge_withOversizedCue_shouldSplitAtWords() {
    let text = "word ".repeat(80);
    let groups = merge(&[RawCue::new(0, 40_000, text.trim())]);

    assert!(groups.len() >= 3);
    for group in &groups {
        assert!(group.text_len() <= MAX_TEXT_LENGTH);
        assert!(group.duration_ms() <= MAX_GROUP_DURATION_MS);
        assert!(group.text.split(' ').all(|w| w == "word"));
    }
}
