//! Tests for the guide runtime: advancing, masking, misuse errors.

use std::sync::Arc;

use stencil_guide::{
    build_regex_index, build_schema_index, Guide, GuideError, IndexConfig, IndexStrategy,
    TokenVocab,
};

fn test_vocab(tokens: &[&str]) -> Arc<TokenVocab> {
    let mut id_to_token: Vec<String> = tokens.iter().map(|s| s.to_string()).collect();
    let eos = id_to_token.len() as u32;
    id_to_token.push("<eos>".to_string());
    Arc::new(TokenVocab::new(id_to_token, eos))
}

#[test]
fn test_advance_through_pattern() {
    // 0="203", 1="-", 2="555", 3="0123", eos=4
    let vocab = test_vocab(&["203", "-", "555", "0123"]);
    let index =
        build_regex_index(r"\d{3}-\d{3}-\d{4}", &vocab, &IndexConfig::default()).unwrap();
    let mut guide = Guide::new(index);

    assert!(!guide.is_finished());
    guide.advance(0).unwrap();
    guide.advance(1).unwrap();
    guide.advance(2).unwrap();
    guide.advance(1).unwrap();
    guide.advance(3).unwrap();
    assert!(guide.is_finished());
    // Terminal eos step.
    guide.advance(4).unwrap();
}

#[test]
fn test_disallowed_token_leaves_state_unchanged() {
    let vocab = test_vocab(&["203", "abc"]);
    let index =
        build_regex_index(r"\d{3}-\d{3}-\d{4}", &vocab, &IndexConfig::default()).unwrap();
    let mut guide = Guide::new(index);

    let before = guide.current_state();
    let err = guide.advance(1).unwrap_err();
    assert!(matches!(err, GuideError::InvalidTransition { token_id: 1, .. }));
    assert_eq!(guide.current_state(), before);
    // The guide is still usable.
    guide.advance(0).unwrap();
}

#[test]
fn test_alternation_branch_extending_shorter_match() {
    // 0="leather", 1="ette", eos=2. Both alternation branches stay live
    // even though one is a prefix of the other.
    let vocab = test_vocab(&["leather", "ette"]);
    let index =
        build_regex_index("(leather|leatherette)", &vocab, &IndexConfig::default()).unwrap();

    let mut guide = Guide::new(index.clone());
    guide.accept_sequence(&[0]).unwrap();

    let mut guide = Guide::new(index);
    guide.accept_sequence(&[0, 1]).unwrap();
}

#[test]
fn test_eos_rejected_before_match_complete() {
    let vocab = test_vocab(&["ab"]);
    let index = build_regex_index("abab", &vocab, &IndexConfig::default()).unwrap();
    let mut guide = Guide::new(index);
    guide.advance(0).unwrap();
    let err = guide.advance(1).unwrap_err(); // eos id
    assert!(matches!(err, GuideError::InvalidTransition { .. }));
}

#[test]
fn test_reset_returns_to_start() {
    let vocab = test_vocab(&["a", "b"]);
    let index = build_regex_index("ab", &vocab, &IndexConfig::default()).unwrap();
    let mut guide = Guide::new(index);
    guide.advance(0).unwrap();
    assert_ne!(guide.current_state(), guide.index().initial_state());
    guide.reset();
    assert_eq!(guide.current_state(), guide.index().initial_state());
}

#[test]
fn test_mask_logits() {
    let vocab = test_vocab(&["a", "b", "c"]);
    let index = build_regex_index("a", &vocab, &IndexConfig::default()).unwrap();
    let guide = Guide::new(index);

    let mut logits = vec![1.0, 2.0, 3.0, 4.0];
    guide.mask_logits(&mut logits).unwrap();
    assert_eq!(logits[0], 1.0, "allowed token keeps its logit");
    assert!(logits[1].is_infinite() && logits[1] < 0.0);
    assert!(logits[2].is_infinite() && logits[2] < 0.0);
    assert!(logits[3].is_infinite() && logits[3] < 0.0, "eos masked while unfinished");
}

#[test]
fn test_many_guides_share_one_index() {
    let vocab = test_vocab(&["y", "n", "yes", "no", "es", "o"]);
    let config = IndexConfig {
        strategy: IndexStrategy::Lazy,
        ..Default::default()
    };
    let index = build_regex_index("(yes|no)", &vocab, &config).unwrap();

    let mut a = Guide::new(index.clone());
    let mut b = Guide::new(index);
    a.advance(2).unwrap(); // "yes"
    b.advance(1).unwrap(); // "n"
    assert!(a.is_finished());
    assert!(!b.is_finished());
    b.advance(5).unwrap(); // "o"
    assert!(b.is_finished());
}

// ===== Round-trip: accepted strings drive the guide cleanly =====

#[test]
fn test_round_trip_accepting() {
    let vocab = test_vocab(&["y", "e", "s", "n", "o"]);
    let index = build_regex_index("(yes|no)", &vocab, &IndexConfig::default()).unwrap();

    // "yes" tokenized per character, then the terminal eos step.
    let mut guide = Guide::new(index.clone());
    guide.accept_sequence(&[0, 1, 2]).unwrap();

    // "no"
    let mut guide = Guide::new(index.clone());
    guide.accept_sequence(&[3, 4]).unwrap();

    // "ye" is a prefix, not a member: the eos step must fail.
    let mut guide = Guide::new(index.clone());
    assert!(guide.accept_sequence(&[0, 1]).is_err());

    // "ny" leaves the language immediately.
    let mut guide = Guide::new(index);
    assert!(guide.accept_sequence(&[3, 0]).is_err());
}

#[test]
fn test_schema_guided_generation() {
    let schema = r#"{
        "type": "object",
        "properties": {"name": {"type": "string"}, "age": {"type": "integer"}},
        "required": ["name", "age"]
    }"#;
    let vocab = test_vocab(&[
        r#"{""#, "name", r#"":"#, r#" "Alice""#, r#", ""#, "age", r#"": "#, "30", "}",
    ]);
    let index = build_schema_index(schema, &vocab, &IndexConfig::default()).unwrap();

    let mut guide = Guide::new(index);
    for token_id in [0, 1, 2, 3, 4, 5, 6, 7, 8] {
        let allowed = guide.allowed_tokens().unwrap();
        assert!(allowed.contains(token_id), "token {token_id} should be allowed");
        guide.advance(token_id).unwrap();
    }
    assert!(guide.is_finished());

    // Skipping "age" entirely cannot reach a final state.
    let mut guide = Guide::new(build_schema_index(schema, &vocab, &IndexConfig::default()).unwrap());
    guide.advance(0).unwrap();
    guide.advance(1).unwrap();
    guide.advance(2).unwrap();
    guide.advance(3).unwrap();
    let err = guide.advance(8).unwrap_err();
    assert!(matches!(err, GuideError::InvalidTransition { .. }));
}

#[test]
fn test_invalid_state_query() {
    let vocab = test_vocab(&["a"]);
    let index = build_regex_index("a", &vocab, &IndexConfig::default()).unwrap();
    assert!(matches!(
        index.allowed_tokens(9999),
        Err(GuideError::InvalidState(9999))
    ));
}
