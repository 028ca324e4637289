//! Repository existence verification against the GitHub API.
//!
//! `/setrepo` persists nothing until the named repository resolves; the
//! rejection messages distinguish a missing repo from bad credentials.

use droidforge_models::{GitCredentials, RepoRef};
use tracing::debug;

use crate::error::Result;

/// Outcome of a repository verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepoCheck {
    /// The repository resolves and is accessible.
    Exists,
    /// The repository does not exist, or is private and inaccessible
    /// with the configured credentials.
    NotFound,
    /// The configured credentials were rejected.
    BadCredentials,
    /// Any other response.
    Unknown(u16),
}

/// Verifies a repository against the GitHub REST API.
///
/// Credentials are attached when configured so private repositories can
/// be verified too.
pub async fn verify_repo(
    client: &reqwest::Client,
    repo: &RepoRef,
    credentials: Option<&GitCredentials>,
) -> Result<RepoCheck> {
    let mut request = client
        .get(repo.api_url())
        .header(reqwest::header::USER_AGENT, "droidforge-bot");
    if let Some(c) = credentials {
        request = request.basic_auth(&c.username, Some(&c.password));
    }

    let response = request.send().await?;
    let status = response.status();
    debug!(repo = %repo, status = %status, "Repository verification response");

    Ok(match status.as_u16() {
        200 => RepoCheck::Exists,
        404 => RepoCheck::NotFound,
        401 => RepoCheck::BadCredentials,
        other => RepoCheck::Unknown(other),
    })
}

/// User-facing message for a verification outcome; `None` means the
/// repository checked out fine.
pub fn rejection_message(check: RepoCheck) -> Option<&'static str> {
    match check {
        RepoCheck::Exists => None,
        RepoCheck::NotFound => Some(
            "Oops! Seems like the repo doesn't exist!\n\
             Make sure the repo link is correct, follows the required format and is public.",
        ),
        RepoCheck::BadCredentials => Some(
            "Oops! Seems like the git credentials are not correct! \
             Please check the credentials and try again!",
        ),
        RepoCheck::Unknown(_) => {
            Some("Unknown error has occurred! Could not verify the repo existence")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_existing_repos_pass() {
        assert_eq!(rejection_message(RepoCheck::Exists), None);
        assert!(rejection_message(RepoCheck::NotFound).is_some());
        assert!(rejection_message(RepoCheck::BadCredentials).is_some());
        assert!(rejection_message(RepoCheck::Unknown(500)).is_some());
    }
}
