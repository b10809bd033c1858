//! robots.txt cache and evaluation.
//!
//! Directives are cached per origin. A robots file that cannot be fetched
//! or parsed is treated as allow-all. Matching follows the classic prefix
//! model: the most specific matching rule wins, with Allow beating Disallow
//! on equal length.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::debug;
use url::Url;

#[derive(Debug, Clone)]
struct RuleGroup {
    agents: Vec<String>,
    /// (path prefix, allow)
    rules: Vec<(String, bool)>,
}

/// Parsed rules of one origin's robots.txt.
#[derive(Debug, Clone, Default)]
pub struct RobotsRules {
    groups: Vec<RuleGroup>,
}

impl RobotsRules {
    /// Parse robots.txt content. Unknown directives are ignored.
    pub fn parse(content: &str) -> Self {
        let mut groups: Vec<RuleGroup> = Vec::new();
        let mut current: Option<RuleGroup> = None;
        let mut last_was_agent = false;

        for line in content.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let Some((field, value)) = line.split_once(':') else {
                continue;
            };
            let field = field.trim().to_lowercase();
            let value = value.trim();

            match field.as_str() {
                "user-agent" => {
                    if last_was_agent {
                        if let Some(group) = current.as_mut() {
                            group.agents.push(value.to_lowercase());
                        }
                    } else {
                        if let Some(group) = current.take() {
                            groups.push(group);
                        }
                        current = Some(RuleGroup {
                            agents: vec![value.to_lowercase()],
                            rules: Vec::new(),
                        });
                    }
                    last_was_agent = true;
                }
                "disallow" | "allow" => {
                    last_was_agent = false;
                    if let Some(group) = current.as_mut() {
                        if !value.is_empty() {
                            group.rules.push((value.to_string(), field == "allow"));
                        }
                    }
                }
                _ => {
                    last_was_agent = false;
                }
            }
        }
        if let Some(group) = current.take() {
            groups.push(group);
        }
        Self { groups }
    }

    /// Whether the agent token may fetch the given path.
    pub fn can_fetch(&self, agent_token: &str, path: &str) -> bool {
        let agent = agent_token.to_lowercase();

        // Most specific matching group: longest agent name that is either
        // "*" or a substring of our token.
        let group = self
            .groups
            .iter()
            .filter(|g| {
                g.agents
                    .iter()
                    .any(|a| a == "*" || agent.contains(a.as_str()))
            })
            .max_by_key(|g| {
                g.agents
                    .iter()
                    .filter(|a| a.as_str() != "*")
                    .map(|a| if agent.contains(a.as_str()) { a.len() } else { 0 })
                    .max()
                    .unwrap_or(0)
            });

        let Some(group) = group else {
            return true;
        };

        let mut best: Option<(usize, bool)> = None;
        for (prefix, allow) in &group.rules {
            if path.starts_with(prefix.as_str()) {
                let len = prefix.len();
                match best {
                    Some((best_len, best_allow)) => {
                        if len > best_len || (len == best_len && *allow && !best_allow) {
                            best = Some((len, *allow));
                        }
                    }
                    None => best = Some((len, *allow)),
                }
            }
        }
        best.map(|(_, allow)| allow).unwrap_or(true)
    }
}

/// Per-origin robots cache.
#[derive(Debug, Default)]
pub struct RobotsCache {
    entries: RwLock<HashMap<String, RobotsRules>>,
}

impl RobotsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether `url` may be fetched by `agent_token`, fetching and
    /// caching the origin's robots.txt on first contact. Fetch failures
    /// count as allow.
    pub async fn allowed(&self, client: &reqwest::Client, agent_token: &str, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return true;
        };
        let Some(host) = parsed.host_str() else {
            return true;
        };
        let origin = format!("{}://{}", parsed.scheme(), host);
        let path = parsed.path();

        if let Some(rules) = self.entries.read().await.get(&origin) {
            return rules.can_fetch(agent_token, path);
        }

        let rules = self.fetch_rules(client, &origin).await;
        let allowed = rules.can_fetch(agent_token, path);
        self.entries.write().await.insert(origin, rules);
        allowed
    }

    async fn fetch_rules(&self, client: &reqwest::Client, origin: &str) -> RobotsRules {
        let robots_url = format!("{origin}/robots.txt");
        let response = client
            .get(&robots_url)
            .timeout(Duration::from_secs(10))
            .send()
            .await;
        match response {
            Ok(resp) if resp.status().is_success() => match resp.text().await {
                Ok(body) => RobotsRules::parse(&body),
                Err(e) => {
                    debug!(origin, error = %e, "robots.txt body unreadable, allowing");
                    RobotsRules::default()
                }
            },
            Ok(resp) => {
                debug!(origin, status = %resp.status(), "no robots.txt, allowing");
                RobotsRules::default()
            }
            Err(e) => {
                debug!(origin, error = %e, "robots.txt unreachable, allowing");
                RobotsRules::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROBOTS: &str = "\
# site robots
User-agent: *
Disallow: /intern/
Allow: /intern/public/

User-agent: bessaquire
Disallow: /sitzungen/archiv/
";

    #[test]
    fn wildcard_group_applies() {
        let rules = RobotsRules::parse(ROBOTS);
        assert!(!rules.can_fetch("somebot/1.0", "/intern/geheim.html"));
        assert!(rules.can_fetch("somebot/1.0", "/intern/public/doc.pdf"));
        assert!(rules.can_fetch("somebot/1.0", "/amtsblatt/"));
    }

    #[test]
    fn specific_group_wins_over_wildcard() {
        let rules = RobotsRules::parse(ROBOTS);
        // The named group has no /intern/ rule, so our agent may fetch it.
        assert!(rules.can_fetch("bessaquire/0.1", "/intern/geheim.html"));
        assert!(!rules.can_fetch("bessaquire/0.1", "/sitzungen/archiv/2019"));
    }

    #[test]
    fn empty_rules_allow_everything() {
        let rules = RobotsRules::parse("");
        assert!(rules.can_fetch("anything", "/any/path"));
    }
}
