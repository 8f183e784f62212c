use super::mocks::MockChain;
use crate::sync::{BlockDownloader, PoppedBlock, SyncError, WindowLimits};
use containers::Height;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

fn limits(max_blocks: usize, concurrency: usize) -> WindowLimits {
    WindowLimits {
        max_blocks,
        concurrency,
    }
}

#[tokio::test]
async fn test_three_block_chain() {
    let chain = Arc::new(MockChain::new(3));
    let downloader = BlockDownloader::start(chain.clone(), limits(1000, 32), Height(0));

    for height in 0..3 {
        let popped = downloader.pop_next().await.unwrap();
        assert_eq!(popped.height, Height(height));
        assert_eq!(popped.block.as_ref(), Some(chain.block(height)));
        assert!(!popped.block.unwrap().is_empty());
    }

    let tip = downloader.pop_next().await.unwrap();
    assert_eq!(
        tip,
        PoppedBlock {
            height: Height(3),
            block: None,
        }
    );
}

#[tokio::test]
async fn test_pops_in_order_under_random_latency() {
    let chain = Arc::new(MockChain::new(60).with_latency(10));
    let downloader = BlockDownloader::start(chain.clone(), limits(16, 8), Height(0));

    for height in 0..60 {
        let popped = downloader.pop_next().await.unwrap();
        assert_eq!(popped.height, Height(height));
        assert_eq!(popped.block.as_ref(), Some(chain.block(height)));
    }
    assert_eq!(downloader.pop_next().await.unwrap().block, None);
}

#[tokio::test]
async fn test_starts_at_given_height() {
    let chain = Arc::new(MockChain::new(30).with_latency(2));
    let downloader = BlockDownloader::start(chain.clone(), limits(8, 4), Height(17));

    for height in 17..30 {
        assert_eq!(downloader.pop_next().await.unwrap().height, Height(height));
    }
    assert_eq!(downloader.pop_next().await.unwrap().block, None);
    assert!(chain.requested().iter().all(|height| *height >= Height(17)));
}

#[tokio::test]
async fn test_limits_hold_at_every_observation() {
    let chain = Arc::new(MockChain::new(80).with_latency(5));
    let downloader = BlockDownloader::start(chain.clone(), limits(6, 3), Height(0));

    // Without consumption the window fills up and stays bounded.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(downloader.block_count() <= 6);
    assert_eq!(downloader.next_height(), Height(6));

    loop {
        assert!(downloader.running_count() <= 3);
        assert!(downloader.block_count() <= 6);
        let popped = downloader.pop_next().await.unwrap();
        if popped.block.is_none() {
            break;
        }
    }
    assert!(chain.max_in_flight() <= 3);
}

#[tokio::test]
async fn test_nothing_scheduled_past_tip_with_single_fetch() {
    let chain = Arc::new(MockChain::new(3));
    let downloader = BlockDownloader::start(chain.clone(), limits(1000, 1), Height(0));

    loop {
        if downloader.pop_next().await.unwrap().block.is_none() {
            break;
        }
    }
    tokio::time::sleep(Duration::from_millis(50)).await;

    let requested: Vec<u32> = chain.requested().iter().map(|height| height.0).collect();
    assert_eq!(requested, vec![0, 1, 2, 3]);
}

#[tokio::test]
async fn test_scheduling_stops_once_tip_is_seen() {
    let chain = Arc::new(MockChain::new(5).with_latency(3));
    let downloader = BlockDownloader::start(chain.clone(), limits(1000, 4), Height(0));

    loop {
        if downloader.pop_next().await.unwrap().block.is_none() {
            break;
        }
    }
    let seen = chain.requested().len();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(chain.requested().len(), seen);
    assert_eq!(downloader.running_count(), 0);
}

#[tokio::test]
async fn test_failed_fetch_is_fatal() {
    let chain = Arc::new(MockChain::new(10).failing_at(4));
    let downloader = BlockDownloader::start(chain.clone(), limits(1000, 2), Height(0));

    for height in 0..4 {
        assert_eq!(downloader.pop_next().await.unwrap().height, Height(height));
    }
    assert!(matches!(
        downloader.pop_next().await,
        Err(SyncError::Fetch { height: Height(4), .. })
    ));
    assert!(matches!(
        downloader.pop_next().await,
        Err(SyncError::DownloaderHalted(Height(4)))
    ));
}

#[tokio::test]
async fn test_cancelled_pop_loses_nothing() {
    let chain = Arc::new(MockChain::new(4).with_latency(30));
    let downloader = BlockDownloader::start(chain.clone(), limits(1000, 4), Height(0));

    let mut heights = Vec::new();
    while heights.len() < 4 {
        if let Ok(popped) = tokio::time::timeout(Duration::from_millis(1), downloader.pop_next()).await {
            heights.push(popped.unwrap().height.0);
        }
    }
    assert_eq!(heights, vec![0, 1, 2, 3]);
}
