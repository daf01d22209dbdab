//! Docker UCP account access
//!
//! Lists organizations, their teams and team members so that access rules can
//! be recreated on the destination. Listings use the `start`/`limit` paging of
//! the accounts API: a page starts after the name (or member id) of the last
//! account of the previous page.

use crate::config::Credentials;
use crate::error::{RegistryError, Result};
use crate::logging::Logger;
use crate::registry::http::{extract_string, AuthMode, HttpAccess, PaginationStyle};
use reqwest::{Method, StatusCode};
use serde_json::Value;

const ACCOUNTS_API: &str = "enzi/v0";
const NEXT_PAGE_START: &str = "nextPageStart";

#[derive(Debug)]
pub struct UcpAccess {
    http: HttpAccess,
}

impl UcpAccess {
    pub fn new(
        url: &str,
        credentials: Option<Credentials>,
        ignore_cert: bool,
        logger: Logger,
    ) -> Result<Self> {
        let auth = match credentials {
            Some(credentials) => AuthMode::Basic(credentials),
            None => AuthMode::Anonymous,
        };
        Ok(Self {
            http: HttpAccess::new(url, auth, ignore_cert, logger)?,
        })
    }

    fn accounts_url(&self, segments: &[&str]) -> Result<String> {
        let mut path = vec![ACCOUNTS_API, "accounts"];
        path.extend_from_slice(segments);
        // Trailing empty segment keeps the trailing slash the API expects
        path.push("");
        self.http.url_for_segments(&path)
    }

    pub async fn test_connection(&self) -> bool {
        self.http.is_reachable("id/").await
    }

    /// Names of all accounts that are organizations
    pub async fn get_organizations(&self) -> Result<Vec<String>> {
        let url = self.accounts_url(&[])?;
        self.list(&url, "accounts", "name", collect_organizations).await
    }

    pub async fn get_teams(&self, organization: &str) -> Result<Vec<String>> {
        let url = self.accounts_url(&[organization, "teams"])?;
        self.list(&url, "teams", "name", collect_names).await
    }

    pub async fn get_members(&self, organization: &str, team: &str) -> Result<Vec<String>> {
        let url = self.accounts_url(&[organization, "teams", team, "members"])?;
        self.list(&url, "members", "member.id", collect_member_names).await
    }

    /// The subset of `candidates` that also exist as UCP users
    pub async fn get_users(&self, candidates: &[String]) -> Result<Vec<String>> {
        let mut users = Vec::new();
        for user in candidates {
            if self.user_exists(user).await? {
                self.http
                    .logger()
                    .verbose(&format!("Found '{}' user in UCP and Artifactory", user));
                users.push(user.clone());
            }
        }
        Ok(users)
    }

    async fn user_exists(&self, user: &str) -> Result<bool> {
        let url = self.http.url_for_segments(&[ACCOUNTS_API, "accounts", user])?;
        let response = self.http.send(self.http.request(Method::GET, &url), None).await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => {
                let account: Value = response.json().await?;
                Ok(account.get("isOrg").and_then(Value::as_bool) != Some(true))
            }
            status => Err(RegistryError::Registry(format!(
                "Lookup of UCP user '{}' failed with status {}",
                user, status
            ))),
        }
    }

    async fn list(
        &self,
        url: &str,
        items_field: &str,
        item_key: &'static str,
        accumulate: fn(&mut Vec<String>, Vec<Value>),
    ) -> Result<Vec<String>> {
        self.http
            .get_with_pagination(
                url,
                items_field,
                PaginationStyle::StartParameter {
                    field: NEXT_PAGE_START,
                    item_key,
                },
                None,
                accumulate,
            )
            .await
    }
}

fn collect_organizations(acc: &mut Vec<String>, page: Vec<Value>) {
    acc.extend(
        page.iter()
            .filter(|account| account.get("isOrg").and_then(Value::as_bool) == Some(true))
            .filter_map(|account| extract_string(account, "name")),
    );
}

fn collect_names(acc: &mut Vec<String>, page: Vec<Value>) {
    acc.extend(page.iter().filter_map(|item| extract_string(item, "name")));
}

fn collect_member_names(acc: &mut Vec<String>, page: Vec<Value>) {
    acc.extend(page.iter().filter_map(|item| extract_string(item, "member.name")));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_only_organizations_are_collected() {
        let mut acc = Vec::new();
        collect_organizations(
            &mut acc,
            vec![
                json!({"name": "engineering", "isOrg": true}),
                json!({"name": "alice", "isOrg": false}),
                json!({"name": "ops", "isOrg": true}),
                json!({"name": "bob"}),
            ],
        );
        assert_eq!(acc, vec!["engineering", "ops"]);
    }

    #[test]
    fn test_member_names_are_nested() {
        let mut acc = Vec::new();
        collect_member_names(
            &mut acc,
            vec![
                json!({"member": {"id": "1", "name": "alice"}, "isAdmin": true}),
                json!({"member": {"id": "2"}}),
                json!({"member": {"id": "3", "name": "carol"}}),
            ],
        );
        assert_eq!(acc, vec!["alice", "carol"]);
    }

    #[test]
    fn test_accounts_urls_are_encoded() {
        let ucp = UcpAccess::new("https://ucp.example.com", None, false, Logger::new_quiet())
            .unwrap();
        assert_eq!(
            ucp.accounts_url(&["dev ops", "teams", "blue/green", "members"]).unwrap(),
            "https://ucp.example.com/enzi/v0/accounts/dev%20ops/teams/blue%2Fgreen/members/"
        );
        assert_eq!(
            ucp.accounts_url(&[]).unwrap(),
            "https://ucp.example.com/enzi/v0/accounts/"
        );
    }
}
