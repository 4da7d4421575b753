//! What a sync phase does when fetching a page fails.

use color_eyre::Result;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPolicy {
  /// Log the error, wait, and request the same page again. Never gives up.
  RetryForever { delay: Duration },
  /// Propagate the error, ending the run.
  Abort,
}

impl FetchPolicy {
  /// Handle a failed fetch of `page` of `what`.
  ///
  /// Returns `Ok(())` when the page should be requested again.
  pub async fn recover(&self, err: color_eyre::Report, what: &str, page: u32) -> Result<()> {
    match *self {
      FetchPolicy::RetryForever { delay } => {
        info!("fetching {} page {}: {:#}; retrying in {:?}", what, page, err, delay);
        tokio::time::sleep(delay).await;
        Ok(())
      }
      FetchPolicy::Abort => Err(err.wrap_err(format!("fetching {} page {}", what, page))),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use color_eyre::eyre::eyre;

  #[tokio::test]
  async fn test_retry_forever_swallows_error() {
    let policy = FetchPolicy::RetryForever {
      delay: Duration::ZERO,
    };
    assert!(policy.recover(eyre!("boom"), "issues", 3).await.is_ok());
  }

  #[tokio::test]
  async fn test_abort_propagates_with_context() {
    let err = FetchPolicy::Abort
      .recover(eyre!("boom"), "timeline of #7", 2)
      .await
      .unwrap_err();
    let text = format!("{:#}", err);
    assert!(text.contains("timeline of #7 page 2"), "{}", text);
    assert!(text.contains("boom"), "{}", text);
  }
}
