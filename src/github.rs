use crate::error::{Error, Result};
use crate::model::{CiCheck, CiCheckState, CiState, Pr, ReviewState, WorkflowRun};
use octocrab::Octocrab;
use std::process::Command;

#[derive(Debug, serde::Serialize)]
struct GraphQlPayload<V> {
    query: &'static str,
    variables: V,
}

#[derive(Debug, serde::Serialize)]
struct RepoVars<'a> {
    owner: &'a str,
    name: &'a str,
}

#[derive(Debug, serde::Serialize)]
struct PrVars<'a> {
    owner: &'a str,
    name: &'a str,
    number: i64,
}

#[derive(Debug, serde::Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, serde::Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    errors: Option<Vec<GraphQlError>>,
}

impl<T> GraphQlResponse<T> {
    fn into_data(self) -> Result<T> {
        if let Some(errors) = self.errors.filter(|e| !e.is_empty()) {
            let joined = errors
                .into_iter()
                .map(|e| e.message)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(Error::GraphQl(joined));
        }
        self.data
            .ok_or_else(|| Error::GraphQl("response had no data".to_string()))
    }
}

#[derive(Debug, serde::Deserialize)]
struct Author {
    login: String,
}

#[derive(Debug, serde::Deserialize)]
struct StatusCheckRollup {
    state: Option<String>,
    contexts: Option<StatusContexts>,
}

#[derive(Debug, serde::Deserialize)]
struct StatusContexts {
    nodes: Option<Vec<StatusContextNode>>,
}

#[derive(Debug, serde::Deserialize)]
struct StatusContextNode {
    #[serde(rename = "__typename")]
    typename: Option<String>,
    // CheckRun
    name: Option<String>,
    conclusion: Option<String>,
    #[serde(rename = "detailsUrl")]
    details_url: Option<String>,
    // StatusContext
    context: Option<String>,
    state: Option<String>,
    #[serde(rename = "targetUrl")]
    target_url: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
struct CommitInner {
    #[serde(rename = "statusCheckRollup")]
    status_check_rollup: Option<StatusCheckRollup>,
    #[serde(rename = "abbreviatedOid")]
    abbreviated_oid: Option<String>,
    #[serde(rename = "messageHeadline")]
    message_headline: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
struct CommitNode {
    commit: Option<CommitInner>,
}

#[derive(Debug, serde::Deserialize)]
struct Commits {
    nodes: Option<Vec<CommitNode>>,
}

#[derive(Debug, serde::Deserialize)]
struct PullRequestNode {
    number: i64,
    title: String,
    url: String,
    state: String,
    #[serde(rename = "headRefName")]
    head_ref_name: String,
    author: Option<Author>,
    #[serde(rename = "reviewDecision")]
    review_decision: Option<String>,
    commits: Option<Commits>,
}

#[derive(Debug, serde::Deserialize)]
struct PullRequests<N> {
    nodes: Option<Vec<N>>,
}

#[derive(Debug, serde::Deserialize)]
struct OpenRepository {
    #[serde(rename = "pullRequests")]
    pull_requests: PullRequests<PullRequestNode>,
}

#[derive(Debug, serde::Deserialize)]
struct OpenData {
    repository: Option<OpenRepository>,
}

#[derive(Debug, serde::Deserialize)]
struct Viewer {
    login: String,
}

#[derive(Debug, serde::Deserialize)]
struct ViewerData {
    viewer: Viewer,
}

#[derive(Debug, serde::Deserialize)]
struct DetailNode {
    title: String,
    body: Option<String>,
    commits: Option<Commits>,
}

#[derive(Debug, serde::Deserialize)]
struct DetailRepository {
    #[serde(rename = "pullRequest")]
    pull_request: Option<DetailNode>,
}

#[derive(Debug, serde::Deserialize)]
struct DetailData {
    repository: Option<DetailRepository>,
}

#[derive(Debug, serde::Deserialize)]
struct MergedNode {
    number: i64,
    title: String,
}

#[derive(Debug, serde::Deserialize)]
struct MergedRepository {
    #[serde(rename = "pullRequests")]
    pull_requests: PullRequests<MergedNode>,
}

#[derive(Debug, serde::Deserialize)]
struct MergedData {
    repository: Option<MergedRepository>,
}

#[derive(Debug, serde::Deserialize)]
struct RunsPage {
    workflow_runs: Vec<RunNode>,
}

#[derive(Debug, serde::Deserialize)]
struct RunNode {
    name: Option<String>,
    status: Option<String>,
    conclusion: Option<String>,
    html_url: String,
}

const OPEN_PRS_QUERY: &str = r#"
query($owner: String!, $name: String!) {
  repository(owner: $owner, name: $name) {
    pullRequests(first: 100, states: OPEN, orderBy: {field: UPDATED_AT, direction: DESC}) {
      nodes {
        number
        title
        url
        state
        headRefName
        author { login }
        reviewDecision
        commits(last: 1) {
          nodes { commit { statusCheckRollup { state } } }
        }
      }
    }
  }
}
"#;

const VIEWER_QUERY: &str = r#"
query { viewer { login } }
"#;

const PR_DETAIL_QUERY: &str = r#"
query($owner: String!, $name: String!, $number: Int!) {
  repository(owner: $owner, name: $name) {
    pullRequest(number: $number) {
      title
      body
      commits(last: 10) {
        nodes {
          commit {
            abbreviatedOid
            messageHeadline
            statusCheckRollup {
              state
              contexts(first: 50) {
                nodes {
                  __typename
                  ... on CheckRun {
                    name
                    conclusion
                    detailsUrl
                  }
                  ... on StatusContext {
                    context
                    state
                    targetUrl
                  }
                }
              }
            }
          }
        }
      }
    }
  }
}
"#;

const MERGED_QUERY: &str = r#"
query($owner: String!, $name: String!) {
  repository(owner: $owner, name: $name) {
    pullRequests(first: 10, states: MERGED, orderBy: {field: UPDATED_AT, direction: DESC}) {
      nodes { number title }
    }
  }
}
"#;

/// `GITHUB_TOKEN`, else whatever `gh auth token` prints.
pub fn token() -> Option<String> {
    if let Ok(t) = std::env::var("GITHUB_TOKEN") {
        if !t.trim().is_empty() {
            return Some(t.trim().to_string());
        }
    }
    let out = Command::new("gh").args(["auth", "token"]).output().ok()?;
    if !out.status.success() {
        return None;
    }
    let t = String::from_utf8_lossy(&out.stdout).trim().to_string();
    (!t.is_empty()).then_some(t)
}

pub fn client() -> Result<Octocrab> {
    let token = token().ok_or(Error::NoCredentials)?;
    Ok(Octocrab::builder().personal_token(token).build()?)
}

fn last_commit(commits: &Option<Commits>) -> Option<&CommitInner> {
    commits
        .as_ref()?
        .nodes
        .as_ref()?
        .last()?
        .commit
        .as_ref()
}

fn map_ci_state(rollup: Option<&StatusCheckRollup>) -> CiState {
    match rollup.and_then(|r| r.state.as_deref()) {
        Some("SUCCESS") => CiState::Success,
        Some("FAILURE") | Some("ERROR") => CiState::Failure,
        Some("PENDING") | Some("EXPECTED") => CiState::Running,
        _ => CiState::None,
    }
}

fn map_ci_checks(rollup: Option<&StatusCheckRollup>) -> Vec<CiCheck> {
    let Some(nodes) = rollup
        .and_then(|r| r.contexts.as_ref())
        .and_then(|c| c.nodes.as_ref())
    else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for n in nodes {
        match n.typename.as_deref() {
            Some("CheckRun") => {
                let state = match n.conclusion.as_deref() {
                    Some("SUCCESS") => CiCheckState::Success,
                    Some("FAILURE") | Some("ERROR") | Some("TIMED_OUT") | Some("STARTUP_FAILURE") => {
                        CiCheckState::Failure
                    }
                    Some("NEUTRAL") | Some("SKIPPED") | Some("STALE") | Some("CANCELLED")
                    | Some("ACTION_REQUIRED") => CiCheckState::Neutral,
                    None => CiCheckState::Running,
                    _ => CiCheckState::None,
                };
                out.push(CiCheck {
                    name: n.name.clone().unwrap_or_else(|| "check".to_string()),
                    state,
                    url: n.details_url.clone(),
                });
            }
            Some("StatusContext") => {
                let state = match n.state.as_deref() {
                    Some("SUCCESS") => CiCheckState::Success,
                    Some("FAILURE") | Some("ERROR") => CiCheckState::Failure,
                    Some("PENDING") | Some("EXPECTED") => CiCheckState::Running,
                    _ => CiCheckState::None,
                };
                out.push(CiCheck {
                    name: n.context.clone().unwrap_or_else(|| "status".to_string()),
                    state,
                    url: n.target_url.clone(),
                });
            }
            _ => {}
        }
    }

    // Failed first, then running, then the rest; by name within a state.
    out.sort_by(|a, b| {
        let rank = |s: &CiCheckState| match s {
            CiCheckState::Failure => 0,
            CiCheckState::Running => 1,
            CiCheckState::Success => 2,
            CiCheckState::Neutral => 3,
            CiCheckState::None => 4,
        };
        rank(&a.state)
            .cmp(&rank(&b.state))
            .then_with(|| a.name.cmp(&b.name))
    });
    out
}

fn to_pr(node: PullRequestNode) -> Pr {
    let ci = map_ci_state(last_commit(&node.commits).and_then(|c| c.status_check_rollup.as_ref()));
    Pr {
        number: node.number,
        title: node.title,
        branch: node.head_ref_name,
        state: node.state,
        review: ReviewState::from_decision(node.review_decision.as_deref()),
        ci,
        url: node.url,
        author: node
            .author
            .map(|a| a.login)
            .unwrap_or_else(|| "unknown".to_string()),
    }
}

/// Open pull requests of `owner/repo`, most recently updated first.
pub async fn list_prs(octo: &Octocrab, owner: &str, repo: &str) -> Result<Vec<Pr>> {
    let payload = GraphQlPayload {
        query: OPEN_PRS_QUERY,
        variables: RepoVars { owner, name: repo },
    };
    let resp: GraphQlResponse<OpenData> = octo.graphql(&payload).await?;
    let repository = resp
        .into_data()?
        .repository
        .ok_or_else(|| Error::GraphQl(format!("repository {owner}/{repo} not found")))?;
    Ok(repository
        .pull_requests
        .nodes
        .unwrap_or_default()
        .into_iter()
        .map(to_pr)
        .collect())
}

pub async fn viewer_login(octo: &Octocrab) -> Result<String> {
    let payload = GraphQlPayload {
        query: VIEWER_QUERY,
        variables: serde_json::json!({}),
    };
    let resp: GraphQlResponse<ViewerData> = octo.graphql(&payload).await?;
    Ok(resp.into_data()?.viewer.login)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrDetail {
    pub title: String,
    pub body: String,
    pub checks: Vec<CiCheck>,
    pub commits: Vec<String>,
}

pub async fn pr_detail(octo: &Octocrab, owner: &str, repo: &str, number: i64) -> Result<PrDetail> {
    let payload = GraphQlPayload {
        query: PR_DETAIL_QUERY,
        variables: PrVars {
            owner,
            name: repo,
            number,
        },
    };
    let resp: GraphQlResponse<DetailData> = octo.graphql(&payload).await?;
    let Some(node) = resp.into_data()?.repository.and_then(|r| r.pull_request) else {
        return Err(Error::GraphQl(format!("{owner}/{repo}#{number} not found")));
    };
    let checks = map_ci_checks(last_commit(&node.commits).and_then(|c| c.status_check_rollup.as_ref()));
    let commits = node
        .commits
        .and_then(|c| c.nodes)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|n| n.commit)
        .map(|c| {
            format!(
                "{} {}",
                c.abbreviated_oid.unwrap_or_default(),
                c.message_headline.unwrap_or_default()
            )
        })
        .rev()
        .collect();
    Ok(PrDetail {
        title: node.title,
        body: node.body.unwrap_or_default(),
        checks,
        commits,
    })
}

/// Recently merged pull requests, as `#123 title` lines.
pub async fn merged_history(octo: &Octocrab, owner: &str, repo: &str) -> Result<Vec<String>> {
    let payload = GraphQlPayload {
        query: MERGED_QUERY,
        variables: RepoVars { owner, name: repo },
    };
    let resp: GraphQlResponse<MergedData> = octo.graphql(&payload).await?;
    Ok(resp
        .into_data()?
        .repository
        .and_then(|r| r.pull_requests.nodes)
        .unwrap_or_default()
        .into_iter()
        .map(|n| format!("#{} {}", n.number, n.title))
        .collect())
}

pub async fn workflow_runs(
    octo: &Octocrab,
    owner: &str,
    repo: &str,
    branch: &str,
) -> Result<Vec<WorkflowRun>> {
    let route = format!("/repos/{owner}/{repo}/actions/runs");
    let params = [("branch", branch), ("per_page", "5")];
    let page: RunsPage = octo.get(route, Some(&params)).await?;
    Ok(page
        .workflow_runs
        .into_iter()
        .map(|r| WorkflowRun {
            name: r.name.unwrap_or_else(|| "workflow".to_string()),
            status: r.status.unwrap_or_default(),
            conclusion: r.conclusion,
            url: r.html_url,
        })
        .collect())
}
