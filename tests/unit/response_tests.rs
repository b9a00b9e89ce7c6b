/*!
 * Tests for parsing model output into translation records
 */

use dualsub::errors::TranslationError;
use dualsub::translation::{extract_json_array, parse_batch_response};

#[test]
fn test_parseBatchResponse_withChattyFencedAnswer_shouldParse() {
    let response = r#"Of course! Here are the translations:

```json
[
  {"correctedText": "So today we are going to talk about ownership in Rust.", "translation": "今天我们来谈谈 Rust 的所有权。", "difficultVocabulary": []},
  {"correctedText": "Any questions?", "translation": "有问题吗？", "difficultVocabulary": []}
]
```

Let me know if you need anything else."#;

    let records = parse_batch_response(response, 2).unwrap();

    assert_eq!(records[1].translation, "有问题吗？");
    assert!(records[0].corrected_text.ends_with("Rust."));
}

#[test]
fn test_parseBatchResponse_withTrailingCommas_shouldRepair() {
    let response = r#"[
        {"correctedText": "a", "translation": "甲", "difficultVocabulary": [],},
        {"correctedText": "b", "translation": "乙", "difficultVocabulary": []},
    ]"#;

    let records = parse_batch_response(response, 2).unwrap();
    assert_eq!(records[0].translation, "甲");
}

#[test]
fn test_parseBatchResponse_withVocabulary_shouldKeepTypeField() {
    let response = r#"[{"correctedText": "ownership", "translation": "所有权", "difficultVocabulary": [
        {"vocabulary": "ownership", "type": "word", "part_of_speech": "n.", "phonetic": "/ˈoʊnərʃɪp/",
         "chinese_meaning": "所有权", "chinese_english_sentence": "Ownership matters. 所有权很重要。"}
    ]}]"#;

    let records = parse_batch_response(response, 1).unwrap();
    let vocab = &records[0].difficult_vocabulary[0];

    assert_eq!(vocab.item_type, "word");
    assert_eq!(vocab.part_of_speech, "n.");
}

#[test]
fn test_parseBatchResponse_withTooFewItems_shouldFail() {
    let response = r#"[{"correctedText": "a", "translation": "甲", "difficultVocabulary": []}]"#;

    assert!(matches!(
        parse_batch_response(response, 2),
        Err(TranslationError::ResponseParse(_))
    ));
}

#[test]
fn test_parseBatchResponse_withExtraItems_shouldTruncate() {
    let response = r#"["甲", "乙", "丙"]"#;

    let records = parse_batch_response(response, 2).unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(records[1].translation, "乙");
}

#[test]
fn test_parseBatchResponse_withObjectInsteadOfArray_shouldFail() {
    assert!(parse_batch_response(r#"{"translation": "你好"}"#, 1).is_err());
}

#[test]
fn test_extractJsonArray_withEmptyResponse_shouldBeEmptyError() {
    assert!(matches!(extract_json_array(""), Err(TranslationError::EmptyResponse)));
}

#[test]
fn test_parseBatchResponse_withBracketedProseBeforeArray_shouldSkipIt() {
    let response = r#"Note [1]: names were kept as-is.
[{"correctedText": "Hi Bob", "translation": "你好，Bob", "difficultVocabulary": []}]"#;

    let records = parse_batch_response(response, 1).unwrap();

    assert_eq!(records[0].translation, "你好，Bob");
}

#[test]
fn test_extractJsonArray_withCitationAndStringArray_shouldStartAtStrings() {
    let array = extract_json_array(r#"Done [ok]. ["甲", "乙"]"#).unwrap();

    assert_eq!(array, r#"["甲", "乙"]"#);
}
