//! Lookahead buffering against a recording requester.

mod common;

use std::time::Duration;

use common::{cache_chunk, metadata, MockRequester};
use readly::engine::{BufferManager, MemoryCache, PlayerState, RetryPolicy};
use readly::progress::{ProgressBar, SegmentState};

fn session(lengths: &[usize]) -> (PlayerState, MemoryCache, MockRequester, ProgressBar) {
    let mut state = PlayerState::new(1.0);
    state.set_metadata(metadata(lengths));
    (state, MemoryCache::new(), MockRequester::default(), ProgressBar::new())
}

#[tokio::test(start_paused = true)]
async fn requests_the_window_once() {
    let (mut state, cache, requester, mut bar) = session(&[10, 10, 10, 10]);
    let buffer = BufferManager::default();

    let report = buffer.sweep(&mut state, &cache, &requester, &mut bar).await;
    assert_eq!(report.requested, vec![0, 1]);
    assert_eq!(requester.calls(), vec![0, 1]);
    assert!(state.channel_ready);

    tokio::time::advance(Duration::from_millis(500)).await;
    let report = buffer.sweep(&mut state, &cache, &requester, &mut bar).await;
    assert!(report.requested.is_empty());
    assert_eq!(report.in_flight, vec![0, 1]);
    assert_eq!(requester.calls(), vec![0, 1]);
}

#[tokio::test(start_paused = true)]
async fn stalled_requests_are_sent_again_after_the_retry_time() {
    let (mut state, cache, requester, mut bar) = session(&[10, 10, 10]);
    let buffer = BufferManager::default();
    buffer.sweep(&mut state, &cache, &requester, &mut bar).await;
    requester.clear();

    tokio::time::advance(Duration::from_millis(3000)).await;
    buffer.sweep(&mut state, &cache, &requester, &mut bar).await;
    assert!(requester.calls().is_empty());

    tokio::time::advance(Duration::from_millis(1)).await;
    buffer.sweep(&mut state, &cache, &requester, &mut bar).await;
    assert_eq!(requester.calls(), vec![0, 1]);
    assert_eq!(state.pending_requests[&0].attempts, 2);
}

#[tokio::test(start_paused = true)]
async fn cached_chunks_are_painted_loaded_except_the_current_one() {
    let (mut state, cache, requester, mut bar) = session(&[10, 10, 10]);
    cache_chunk(&cache, 0);
    cache_chunk(&cache, 1);

    let report = BufferManager::default()
        .sweep(&mut state, &cache, &requester, &mut bar)
        .await;
    assert_eq!(report.cached, vec![0, 1]);
    assert!(requester.calls().is_empty());
    assert_eq!(bar.state_of(&state.progress_marks[0]), SegmentState::Default);
    assert_eq!(bar.state_of(&state.progress_marks[1]), SegmentState::Loaded);
    assert_eq!(bar.state_of(&state.progress_marks[2]), SegmentState::Default);
}

#[tokio::test(start_paused = true)]
async fn arrival_clears_the_pending_entry() {
    let (mut state, cache, requester, mut bar) = session(&[10, 10]);
    let buffer = BufferManager::default();
    buffer.sweep(&mut state, &cache, &requester, &mut bar).await;
    assert!(state.pending_requests.contains_key(&1));

    cache_chunk(&cache, 1);
    buffer.sweep(&mut state, &cache, &requester, &mut bar).await;
    assert!(!state.pending_requests.contains_key(&1));
    assert!(state.pending_requests.contains_key(&0));
}

#[tokio::test(start_paused = true)]
async fn window_is_clamped_at_the_last_sentence() {
    let (mut state, cache, requester, mut bar) = session(&[10, 10, 10]);
    state.play_idx = 2;
    let report = BufferManager::new(4, RetryPolicy::default())
        .sweep(&mut state, &cache, &requester, &mut bar)
        .await;
    assert_eq!(report.requested, vec![2]);
}

#[tokio::test(start_paused = true)]
async fn failed_send_records_nothing_and_stops_the_sweep() {
    let (mut state, cache, requester, mut bar) = session(&[10, 10, 10]);
    let buffer = BufferManager::default();
    requester.set_failing(true);

    let report = buffer.sweep(&mut state, &cache, &requester, &mut bar).await;
    assert_eq!(report.failed, vec![0]);
    assert!(report.requested.is_empty());
    assert!(state.pending_requests.is_empty());

    requester.set_failing(false);
    let report = buffer.sweep(&mut state, &cache, &requester, &mut bar).await;
    assert_eq!(report.requested, vec![0, 1]);
}

#[tokio::test(start_paused = true)]
async fn closed_channel_defers_requests_and_asks_for_a_connection() {
    let (mut state, cache, requester, mut bar) = session(&[10, 10, 10]);
    let buffer = BufferManager::default();
    requester.set_offline(true);

    let report = buffer.sweep(&mut state, &cache, &requester, &mut bar).await;
    assert_eq!(report.deferred, vec![0]);
    assert!(report.is_incomplete());
    assert!(requester.calls().is_empty());
    assert_eq!(requester.connects(), 1);
    assert!(state.pending_requests.is_empty());
    assert!(!state.channel_ready);

    requester.set_offline(false);
    let report = buffer.sweep(&mut state, &cache, &requester, &mut bar).await;
    assert_eq!(report.requested, vec![0, 1]);
    assert!(!report.is_incomplete());
    assert!(state.channel_ready);
}

#[tokio::test(start_paused = true)]
async fn cached_window_needs_no_connection() {
    let (mut state, cache, requester, mut bar) = session(&[10, 10]);
    cache_chunk(&cache, 0);
    cache_chunk(&cache, 1);
    requester.set_offline(true);

    let report = BufferManager::default()
        .sweep(&mut state, &cache, &requester, &mut bar)
        .await;
    assert_eq!(report.cached, vec![0, 1]);
    assert_eq!(requester.connects(), 0);
}

#[tokio::test(start_paused = true)]
async fn backoff_then_give_up() {
    let (mut state, cache, requester, mut bar) = session(&[10]);
    let buffer = BufferManager::new(
        2,
        RetryPolicy {
            retry_after: Duration::from_secs(1),
            backoff: 2.0,
            max_attempts: Some(2),
        },
    );

    buffer.sweep(&mut state, &cache, &requester, &mut bar).await;
    tokio::time::advance(Duration::from_millis(1001)).await;
    let report = buffer.sweep(&mut state, &cache, &requester, &mut bar).await;
    assert_eq!(report.requested, vec![0]);

    // second delay is doubled
    tokio::time::advance(Duration::from_millis(1500)).await;
    let report = buffer.sweep(&mut state, &cache, &requester, &mut bar).await;
    assert_eq!(report.in_flight, vec![0]);

    tokio::time::advance(Duration::from_millis(600)).await;
    let report = buffer.sweep(&mut state, &cache, &requester, &mut bar).await;
    assert_eq!(report.unavailable, vec![0]);
    assert!(state.unavailable.contains(&0));
    assert_eq!(requester.calls(), vec![0, 0]);
}
