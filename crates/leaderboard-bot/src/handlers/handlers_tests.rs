use chrono::{TimeZone, Utc};
use leaderboard_nats::topics::{backend, chat};
use leaderboard_types::*;

use super::{history, leaderboard, season, tags};
use crate::errors::ErrorKind;
use crate::router::MessageContext;

const BATCH_ID: &str = "6f1c2a4e-8f8e-4a55-9a63-1b0c5d6e7f80";
const SEASON_ID: &str = "0b7c9d2e-3f41-4c5a-8e6f-7a8b9c0d1e2f";

fn ctx(topic: &str) -> MessageContext {
    MessageContext::for_test(topic, Some("corr-1"))
}

fn reply_of(results: &[crate::router::OutboundResult]) -> InteractionReplyPayload {
    assert_eq!(results.len(), 1);
    results[0].decode()
}

#[tokio::test]
async fn assign_request_is_forwarded_with_opaque_update_id() {
    let payload = TagAssignmentRequestedPayload {
        guild_id: "G1".into(),
        user_id: "U1".into(),
        tag_number: 7,
        requesting_user_id: Some("ADMIN".into()),
        update_id: Some("not-a-uuid-at-all".into()),
        source: None,
    };
    let results = tags::handle_assign_requested(ctx(chat::TAG_ASSIGN_REQUESTED), payload.clone())
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].topic, backend::TAG_ASSIGNMENT_REQUESTED);
    assert_eq!(results[0].decode::<TagAssignmentRequestedPayload>(), payload);
}

#[tokio::test]
async fn assign_request_without_user_is_rejected() {
    let payload = TagAssignmentRequestedPayload {
        guild_id: "G1".into(),
        user_id: " ".into(),
        tag_number: 7,
        requesting_user_id: None,
        update_id: None,
        source: None,
    };
    let err = tags::handle_assign_requested(ctx(chat::TAG_ASSIGN_REQUESTED), payload)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadPayload);
    assert!(err.to_string().contains("missing user_id"));
}

#[tokio::test]
async fn self_swap_is_rejected() {
    let payload = TagSwapRequestedPayload {
        guild_id: "G1".into(),
        requestor_id: "U1".into(),
        target_id: "U1".into(),
    };
    let err = tags::handle_swap_requested(ctx(chat::TAG_SWAP_REQUESTED), payload)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadPayload);
}

#[tokio::test]
async fn tag_assigned_becomes_claim_success() {
    let payload = TagAssignedPayload {
        guild_id: "G1".into(),
        user_id: "U1".into(),
        tag_number: 7,
        assignment_id: None,
    };
    let results = tags::handle_tag_assigned(ctx(backend::TAG_ASSIGNED), payload)
        .await
        .unwrap();
    assert_eq!(results[0].topic, chat::TAG_REPLY);
    let reply = reply_of(&results);
    assert_eq!(reply.content, "✅ Successfully claimed tag #7!");
    assert_eq!(reply.outcome, ReplyOutcome::Success);
}

#[tokio::test]
async fn tag_assigned_with_bad_assignment_id_is_rejected() {
    let payload = TagAssignedPayload {
        guild_id: "G1".into(),
        user_id: "U1".into(),
        tag_number: 7,
        assignment_id: Some("42".into()),
    };
    let err = tags::handle_tag_assigned(ctx(backend::TAG_ASSIGNED), payload)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("assignment_id is not a UUID"));
}

#[tokio::test]
async fn batch_assigned_reports_the_requesters_tag() {
    let payload = BatchTagAssignedPayload {
        guild_id: "G1".into(),
        batch_id: BATCH_ID.into(),
        requesting_user_id: "U2".into(),
        assignments: vec![
            TagAssignmentInfo {
                user_id: "U1".into(),
                tag_number: 3,
            },
            TagAssignmentInfo {
                user_id: "U2".into(),
                tag_number: 9,
            },
        ],
    };
    let results = tags::handle_batch_assigned(ctx(backend::BATCH_TAG_ASSIGNED), payload)
        .await
        .unwrap();
    assert_eq!(reply_of(&results).content, "✅ Successfully claimed tag #9!");
}

#[tokio::test]
async fn batch_assigned_requires_uuid_and_assignments() {
    let mut payload = BatchTagAssignedPayload {
        guild_id: "G1".into(),
        batch_id: "batch-1".into(),
        requesting_user_id: "U1".into(),
        assignments: vec![TagAssignmentInfo {
            user_id: "U1".into(),
            tag_number: 1,
        }],
    };
    assert!(
        tags::handle_batch_assigned(ctx(backend::BATCH_TAG_ASSIGNED), payload.clone())
            .await
            .is_err()
    );

    payload.batch_id = BATCH_ID.into();
    payload.assignments.clear();
    let err = tags::handle_batch_assigned(ctx(backend::BATCH_TAG_ASSIGNED), payload)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("without assignments"));
}

#[tokio::test]
async fn failure_reasons_are_sanitized() {
    let payload = TagAssignmentFailedPayload {
        guild_id: "G1".into(),
        user_id: "U1".into(),
        tag_number: Some(7),
        reason: "tag `7` is held by ```someone```".into(),
    };
    let results = tags::handle_assignment_failed(ctx(backend::TAG_ASSIGNMENT_FAILED), payload)
        .await
        .unwrap();
    let reply = reply_of(&results);
    assert_eq!(reply.content, "❌ Could not claim tag #7: tag 7 is held by someone");
    assert_eq!(reply.outcome, ReplyOutcome::Failure);
    assert!(!reply.content.contains('`'));
}

#[tokio::test]
async fn availability_result_reads_naturally() {
    let payload = TagAvailabilityResultPayload {
        guild_id: "G1".into(),
        user_id: "U1".into(),
        tag_number: 12,
        is_available: false,
        reason: Some("held by `U9`".into()),
    };
    let results = tags::handle_availability_result(ctx(backend::TAG_AVAILABILITY_CHECK_RESULT), payload)
        .await
        .unwrap();
    assert_eq!(reply_of(&results).content, "❌ Tag #12 is not available: held by U9");
}

#[tokio::test]
async fn retrieved_leaderboard_is_displayed_to_the_requester() {
    let mut ctx = ctx(backend::LEADERBOARD_RETRIEVE_RESPONSE);
    ctx.metadata
        .insert(metadata::CHANNEL_ID.to_string(), "555".to_string());
    let payload = LeaderboardRetrievedPayload {
        guild_id: "G1".into(),
        leaderboard_id: None,
        entries: vec![LeaderboardEntry {
            rank: 1,
            user_id: "U1".into(),
            tag_number: Some(1),
        }],
    };
    let results = leaderboard::handle_retrieved(ctx, payload).await.unwrap();
    assert_eq!(results[0].topic, chat::DISPLAY);
    let display: LeaderboardDisplayPayload = results[0].decode();
    assert_eq!(display.trigger, DisplayTrigger::Requested);
    assert_eq!(display.channel_id.as_deref(), Some("555"));
    assert_eq!(display.entries.len(), 1);
}

#[tokio::test]
async fn out_of_order_ranks_are_rejected() {
    let ranked = |ranks: &[u32]| LeaderboardUpdatedPayload {
        guild_id: "G1".into(),
        leaderboard_id: None,
        round_id: None,
        entries: ranks
            .iter()
            .map(|&rank| LeaderboardEntry {
                rank,
                user_id: format!("U{rank}"),
                tag_number: None,
            })
            .collect(),
    };

    // Duplicate, gapped, and zero-based ranks.
    for ranks in [&[2, 2][..], &[1, 3, 7], &[0, 1]] {
        let err = leaderboard::handle_updated(ctx(backend::LEADERBOARD_UPDATED), ranked(ranks))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadPayload, "ranks {ranks:?}");
    }

    let ok = leaderboard::handle_updated(ctx(backend::LEADERBOARD_UPDATED), ranked(&[1, 2, 3]))
        .await
        .unwrap();
    assert_eq!(ok.len(), 1);
}

#[tokio::test]
async fn season_start_success_requires_uuid() {
    let payload = SeasonStartedPayload {
        guild_id: "G1".into(),
        season_id: "season-1".into(),
        season_name: "Spring".into(),
    };
    assert!(
        season::handle_started(ctx(backend::SEASON_START_SUCCESS), payload)
            .await
            .is_err()
    );

    let payload = SeasonStartedPayload {
        guild_id: "G1".into(),
        season_id: SEASON_ID.into(),
        season_name: "Spring".into(),
    };
    let results = season::handle_started(ctx(backend::SEASON_START_SUCCESS), payload)
        .await
        .unwrap();
    assert_eq!(results[0].topic, chat::SEASON_REPLY);
    let reply: SeasonReplyPayload = results[0].decode();
    assert_eq!(reply.content, "🏁 Season **Spring** has started!");
    assert_eq!(reply.outcome, ReplyOutcome::Success);
}

#[tokio::test]
async fn season_end_failure_is_a_failure_reply() {
    let payload = SeasonEndFailedPayload {
        guild_id: "G1".into(),
        reason: "no active season".into(),
    };
    let results = season::handle_end_failed(ctx(backend::SEASON_END_FAILED), payload)
        .await
        .unwrap();
    let reply: SeasonReplyPayload = results[0].decode();
    assert_eq!(reply.outcome, ReplyOutcome::Failure);
    assert_eq!(reply.content, "❌ Could not end the season: no active season");
}

#[tokio::test]
async fn long_history_is_truncated() {
    let entries: Vec<TagHistoryEntry> = (0..300)
        .map(|i| TagHistoryEntry {
            tag_number: i % 100 + 1,
            event_type: "swapped".into(),
            occurred_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            other_member_id: Some(format!("U{i}")),
        })
        .collect();
    let payload = TagHistoryRetrievedPayload {
        guild_id: "G1".into(),
        member_id: "U1".into(),
        entries,
    };
    let results = history::handle_history(ctx(backend::TAG_HISTORY_RESPONSE), payload)
        .await
        .unwrap();
    let reply = reply_of(&results);
    assert!(reply.content.chars().count() <= 2000);
    assert!(reply.content.ends_with("..."));
}

#[tokio::test]
async fn chart_bytes_become_a_chart_reply() {
    let payload = TagGraphRetrievedPayload {
        guild_id: "G1".into(),
        member_id: "U1".into(),
        png: vec![0x89, b'P', b'N', b'G'],
    };
    let results = history::handle_graph(ctx(backend::TAG_GRAPH_RESPONSE), payload)
        .await
        .unwrap();
    assert_eq!(results[0].topic, chat::CHART_REPLY);
    let chart: ChartReplyPayload = results[0].decode();
    assert_eq!(chart.png, vec![0x89, b'P', b'N', b'G']);
}

#[tokio::test]
async fn empty_chart_is_reported_as_text() {
    let payload = TagGraphRetrievedPayload {
        guild_id: "G1".into(),
        member_id: "U1".into(),
        png: vec![],
    };
    let results = history::handle_graph(ctx(backend::TAG_GRAPH_RESPONSE), payload)
        .await
        .unwrap();
    assert_eq!(results[0].topic, chat::HISTORY_REPLY);
    assert_eq!(reply_of(&results).content, history::NOTHING_TO_CHART);
}
