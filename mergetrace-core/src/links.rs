//! Attaching platform links to merge results.

use serde::Serialize;

use crate::merge::{MergeCheckResult, MergeKind, MergeStatus};
use crate::platform::{ReferenceStyle, ResolvedPlatform};

/// Web links for one merged result. Either link may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LinkSet {
  pub commit: Option<String>,
  pub merge_request: Option<String>,
}

/// Fills [`MergeCheckResult::links`] from a resolved platform.
///
/// With no platform, links stay `None`, but merge request references are
/// still extracted with [`ReferenceStyle::Auto`] so they can be shown as text.
#[derive(Debug, Clone, Copy)]
pub struct LinkEnricher<'a> {
  platform: Option<&'a ResolvedPlatform>,
}

impl<'a> LinkEnricher<'a> {
  pub fn new(platform: Option<&'a ResolvedPlatform>) -> Self {
    Self { platform }
  }

  pub fn enrich(&self, mut result: MergeCheckResult) -> MergeCheckResult {
    let MergeStatus::Merged(details) = &mut result.status else {
      return result;
    };

    if details.kind == MergeKind::Merge {
      details.request = match self.platform {
        Some(platform) => platform.extract_reference(&details.commit.message),
        None => ReferenceStyle::Auto.extract(&details.commit.message),
      };
    }

    if let Some(platform) = self.platform {
      let links = LinkSet {
        commit: platform.commit_link(&details.commit.id.to_string()),
        merge_request: details
          .request
          .as_ref()
          .and_then(|request| platform.merge_request_link(&request.id)),
      };
      if links.commit.is_some() || links.merge_request.is_some() {
        result.links = Some(links);
      }
    }

    result
  }

  pub fn enrich_all(&self, results: Vec<MergeCheckResult>) -> Vec<MergeCheckResult> {
    results.into_iter().map(|result| self.enrich(result)).collect()
  }
}
