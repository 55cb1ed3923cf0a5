//! Verifier behavior at the engine boundary: disabled configs degrade to
//! the deterministic pattern heuristic, and verdict parsing round-trips.

use drover_adapters::{LlmVerifier, VerifierAdapter, VerifierConfigSource, VerifyTask};
use drover_core::{parse_verdict, Verdict, VerifierConfig};

#[derive(Clone)]
struct DisabledConfig;

impl VerifierConfigSource for DisabledConfig {
    fn load(&self) -> VerifierConfig {
        VerifierConfig::default()
    }
}

fn verify_task() -> VerifyTask {
    VerifyTask {
        name: "build the crate".to_string(),
        prompt: "run cargo build".to_string(),
        verification_prompt: None,
    }
}

#[tokio::test]
async fn disabled_verifier_is_deterministic_over_the_pattern_table() {
    let verifier = LlmVerifier::new(DisabledConfig);

    let cases: &[(&str, bool, f32)] = &[
        ("Do you want to continue? (y/n)", false, 0.7),
        ("error: compilation failed", false, 0.6),
        ("Build finished\nAll tests passed", true, 0.6),
        ("copying files to target", false, 0.3),
    ];

    for (output, passed, confidence) in cases {
        // Same input, same verdict, every time
        for _ in 0..3 {
            let verdict = verifier.verify(&verify_task(), output).await;
            assert_eq!(verdict.passed, *passed, "output: {output:?}");
            assert!(
                (verdict.confidence - confidence).abs() < f32::EPSILON,
                "output: {output:?}"
            );
        }
    }
}

#[tokio::test]
async fn disabled_verifier_summary_uses_fixed_phrases() {
    let verifier = LlmVerifier::new(DisabledConfig);
    let summary = verifier
        .status_summary("build the crate", "Compiling drover v0.1.0")
        .await;
    assert_eq!(summary, "Working...");
    assert!(summary.len() <= 100);
}

#[test]
fn verdict_parse_serialize_parse_is_stable() {
    let original = Verdict::new(true, "all checks green", 0.85);
    let json = serde_json::to_string(&original).unwrap();
    let reparsed = parse_verdict(&json).unwrap();
    let json_again = serde_json::to_string(&reparsed).unwrap();
    let reparsed_again = parse_verdict(&json_again).unwrap();

    assert_eq!(reparsed, reparsed_again);
    assert_eq!(reparsed.passed, original.passed);
    assert_eq!(reparsed.feedback, original.feedback);
}

#[test]
fn out_of_range_confidence_is_clamped_on_parse() {
    let verdict =
        parse_verdict(r#"{"passed": false, "feedback": "overconfident", "confidence": 17.0}"#)
            .unwrap();
    assert!((verdict.confidence - 1.0).abs() < f32::EPSILON);
}
