use super::{Feedback, Variant};
use crate::command::Command;
use anyhow::Result;
use std::time::Duration;
use tokio::time::advance;

const REVERT: Duration = Duration::from_millis(1500);

/// Lets freshly spawned revert tasks start their sleep before time moves.
async fn settle() {
    for _ in 0..4 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn test_success_reverts_after_delay() -> Result<()> {
    let feedback = Feedback::new(REVERT);

    let revert = feedback.show(Command::Manual, Variant::Success);
    settle().await;
    assert_eq!(feedback.variant(Command::Manual), Variant::Success);

    advance(Duration::from_millis(1499)).await;
    settle().await;
    assert_eq!(feedback.variant(Command::Manual), Variant::Success);

    advance(Duration::from_millis(1)).await;
    revert.await?;
    assert_eq!(feedback.variant(Command::Manual), Variant::Default);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_error_touches_only_its_control() -> Result<()> {
    let feedback = Feedback::new(REVERT);

    let revert = feedback.show(Command::Arm, Variant::Error);

    for other in Command::ALL.into_iter().filter(|c| *c != Command::Arm) {
        assert_eq!(feedback.variant(other), Variant::Default);
    }
    assert_eq!(feedback.variant(Command::Arm), Variant::Error);

    revert.await?;
    assert_eq!(feedback.variant(Command::Arm), Variant::Default);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_overlapping_reverts_end_in_default() -> Result<()> {
    let feedback = Feedback::new(REVERT);

    let first = feedback.show(Command::Hold, Variant::Success);
    settle().await;
    advance(Duration::from_millis(1000)).await;
    let second = feedback.show(Command::Hold, Variant::Error);
    settle().await;
    assert_eq!(feedback.variant(Command::Hold), Variant::Error);

    // The first timer is not cancelled and fires 500 ms into the second one.
    advance(Duration::from_millis(500)).await;
    first.await?;
    assert_eq!(feedback.variant(Command::Hold), Variant::Default);

    second.await?;
    assert_eq!(feedback.variant(Command::Hold), Variant::Default);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_version_moves_on_every_change() -> Result<()> {
    let feedback = Feedback::new(REVERT);
    let start = feedback.version();

    let revert = feedback.show(Command::Land, Variant::Success);
    assert_eq!(feedback.version(), start + 1);

    revert.await?;
    assert_eq!(feedback.version(), start + 2);
    Ok(())
}

#[test]
fn test_variant_from_outcome() {
    assert_eq!(Variant::from_outcome(true), Variant::Success);
    assert_eq!(Variant::from_outcome(false), Variant::Error);
}
