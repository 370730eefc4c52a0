//! Property tests for trimming and overflow recovery.
//!
//! Conversations are generated as sequences of steps (plain text, a single
//! tool call with its result, or two parallel calls answered in separate
//! messages), optionally ending with a call still waiting for its result.
//! Every generated conversation satisfies the pairing invariant.

use proptest::prelude::*;
use serde_json::json;
use trimline::context::estimate::estimate_messages_tokens;
use trimline::context::pairing::validate_pairing;
use trimline::context::TrimEngine;
use trimline::prelude::*;

// ── Generators ──────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum Step {
    User(String),
    Assistant(String),
    Call { result_len: usize },
    Parallel { first_len: usize, second_len: usize },
}

fn arb_text() -> impl Strategy<Value = String> {
    "[a-z ]{0,120}"
}

fn arb_step() -> impl Strategy<Value = Step> {
    prop_oneof![
        arb_text().prop_map(Step::User),
        arb_text().prop_map(Step::Assistant),
        (0usize..3000).prop_map(|result_len| Step::Call { result_len }),
        (0usize..1500, 0usize..1500)
            .prop_map(|(first_len, second_len)| Step::Parallel { first_len, second_len }),
    ]
}

fn build(tag: &str, steps: &[Step], pending_tail: bool) -> Vec<Message> {
    let mut messages = Vec::new();
    let mut next_id = 0usize;
    let mut id = || {
        next_id += 1;
        format!("{tag}-{next_id}")
    };

    for step in steps {
        match step {
            Step::User(text) => messages.push(Message::user(text.clone())),
            Step::Assistant(text) => messages.push(Message::assistant(text.clone())),
            Step::Call { result_len } => {
                let call = id();
                messages.push(Message::tool_invocation(&call, "fetch", json!({"n": result_len})));
                messages.push(Message::tool_result(&call, "x".repeat(*result_len)));
            }
            Step::Parallel {
                first_len,
                second_len,
            } => {
                let (a, b) = (id(), id());
                messages.push(
                    Message::tool_invocation(&a, "read", json!({}))
                        .with_block(ContentBlock::tool_invocation(&b, "read", json!({}))),
                );
                messages.push(Message::tool_result(&a, "y".repeat(*first_len)));
                messages.push(Message::tool_result(&b, "z".repeat(*second_len)));
            }
        }
    }

    if pending_tail {
        messages.push(Message::tool_invocation(id(), "search", json!({"q": "pending"})));
    }
    messages
}

fn arb_conversation() -> impl Strategy<Value = Vec<Message>> {
    (prop::collection::vec(arb_step(), 0..25), any::<bool>())
        .prop_map(|(steps, pending)| build("call", &steps, pending))
}

fn arb_plain_conversation() -> impl Strategy<Value = Vec<Message>> {
    prop::collection::vec(arb_text().prop_map(Message::user), 0..40)
}

#[derive(Debug, Clone)]
enum Op {
    Hook,
    Overflow,
    Append(Vec<Step>),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => Just(Op::Hook),
        1 => Just(Op::Overflow),
        2 => prop::collection::vec(arb_step(), 1..4).prop_map(Op::Append),
    ]
}

// ── Properties ──────────────────────────────────────────────────────

proptest! {
    #[test]
    fn plain_trim_fits_budget_or_hits_floor(
        messages in arb_plain_conversation(),
        target in 1usize..2000,
        floor in 1usize..5,
    ) {
        let estimator = CharRatioEstimator::default();
        let mut buffer = ConversationBuffer::from_messages(messages);
        let result = TrimEngine::new(floor).trim(&mut buffer, &estimator, target);

        prop_assert_eq!(result.resulting_token_estimate, buffer.estimate_tokens(&estimator));
        prop_assert!(
            result.resulting_token_estimate <= target || buffer.len() <= floor,
            "{} tokens in {} messages against target {} and floor {}",
            result.resulting_token_estimate, buffer.len(), target, floor
        );
    }

    #[test]
    fn trim_never_breaks_pairing(
        messages in arb_conversation(),
        target in 0usize..3000,
        floor in 1usize..5,
    ) {
        prop_assert_eq!(validate_pairing(&messages), Ok(()));
        let mut buffer = ConversationBuffer::from_messages(messages);
        TrimEngine::new(floor).trim(&mut buffer, &CharRatioEstimator::default(), target);
        prop_assert_eq!(validate_pairing(buffer.messages()), Ok(()));
    }

    #[test]
    fn trim_removes_a_contiguous_prefix(
        messages in arb_conversation(),
        target in 0usize..3000,
        floor in 1usize..5,
    ) {
        let original = messages.clone();
        let mut buffer = ConversationBuffer::from_messages(messages);
        let result = TrimEngine::new(floor).trim(&mut buffer, &CharRatioEstimator::default(), target);

        prop_assert_eq!(buffer.messages(), &original[result.removed_count..]);
        if original.len() >= floor {
            prop_assert!(buffer.len() >= floor);
        }
    }

    #[test]
    fn trim_is_idempotent(
        messages in arb_conversation(),
        target in 0usize..3000,
        floor in 1usize..5,
    ) {
        let engine = TrimEngine::new(floor);
        let estimator = CharRatioEstimator::default();
        let mut buffer = ConversationBuffer::from_messages(messages);
        engine.trim(&mut buffer, &estimator, target);
        let settled = buffer.clone();

        let again = engine.trim(&mut buffer, &estimator, target);
        prop_assert_eq!(again.removed_count, 0);
        prop_assert_eq!(buffer, settled);
    }

    #[test]
    fn counters_never_decrease(
        initial in prop::collection::vec(arb_step(), 0..15),
        ops in prop::collection::vec(arb_op(), 1..30),
        max_tokens in 50usize..3000,
        interval in 1u32..4,
    ) {
        let config = ManagerConfig::new(max_tokens).with_cadence(Cadence::EveryN(interval));
        let mut manager = HistoryManager::new(config).unwrap();
        let mut buffer = ConversationBuffer::from_messages(build("init", &initial, false));
        let (mut calls, mut removed) = (0u64, 0u64);

        for (i, op) in ops.into_iter().enumerate() {
            match op {
                Op::Hook => {
                    manager.apply_management(&mut buffer);
                }
                Op::Overflow => {
                    // Unrecoverable is a legal outcome; the buffer stays valid.
                    let _ = manager.reduce_context(&mut buffer, &"overflow");
                }
                Op::Append(steps) => buffer.extend(build(&format!("op{i}"), &steps, false)),
            }
            prop_assert!(manager.call_counter() >= calls);
            prop_assert!(manager.removed_message_count() >= removed);
            calls = manager.call_counter();
            removed = manager.removed_message_count();
            prop_assert_eq!(validate_pairing(buffer.messages()), Ok(()));
        }
    }

    #[test]
    fn estimate_matches_per_message_sum(messages in arb_conversation()) {
        let estimator = CharRatioEstimator::default();
        let buffer = ConversationBuffer::from_messages(messages.clone());
        prop_assert_eq!(
            buffer.estimate_tokens(&estimator),
            estimate_messages_tokens(&estimator, &messages)
        );
    }
}
