//! Minimal client for the Scaleway Instance API.

use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ProviderError;

const PROVIDER: &str = "scaleway";

/// Server as returned by the Instance API.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Server {
    pub id: String,
    pub name: String,
    pub state: String,
    #[serde(default)]
    pub public_ip: Option<Ip>,
    #[serde(default)]
    pub public_ips: Vec<Ip>,
}

impl Server {
    /// Whether a public IPv4 is attached.
    pub fn has_public_ip(&self) -> bool {
        self.public_ip.is_some() || !self.public_ips.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct ServerEnvelope {
    server: Server,
}

#[derive(Debug, Deserialize)]
struct ServersEnvelope {
    servers: Vec<Server>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Ip {
    pub id: String,
    #[serde(default)]
    pub address: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IpEnvelope {
    ip: Ip,
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateServerRequest<'a> {
    pub name: &'a str,
    pub commercial_type: &'a str,
    pub image: &'a str,
    pub dynamic_ip_required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_group: Option<&'a str>,
    #[serde(skip_serializing_if = "no_tags")]
    pub tags: &'a [String],
}

#[derive(Debug, Serialize)]
struct CreateIpRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    project: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    organization: Option<&'a str>,
    server: &'a str,
    #[serde(skip_serializing_if = "no_tags")]
    tags: &'a [String],
}

#[derive(Debug, Serialize)]
struct ActionRequest<'a> {
    action: &'a str,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
}

fn no_tags(tags: &&[String]) -> bool {
    tags.is_empty()
}

/// Ownership scope of created resources.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Scope<'a> {
    pub project: Option<&'a str>,
    pub organization: Option<&'a str>,
}

/// Instance API client bound to one zone.
#[derive(Debug, Clone)]
pub(crate) struct InstanceApi {
    inner: reqwest::Client,
    base_url: String,
    secret_key: String,
}

impl InstanceApi {
    pub fn new(api_url: &str, zone: &str, secret_key: &str) -> Self {
        Self {
            inner: reqwest::Client::new(),
            base_url: format!(
                "{}/instance/v1/zones/{}",
                api_url.trim_end_matches('/'),
                zone
            ),
            secret_key: secret_key.to_string(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn check(response: Response, path: &str) -> Result<Response, ProviderError> {
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ProviderError::NotFound(path.to_string()));
        }
        if !status.is_success() {
            let message = response
                .json::<ApiErrorBody>()
                .await
                .map(|b| b.message)
                .unwrap_or_default();
            return Err(ProviderError::Api {
                provider: PROVIDER,
                path: path.to_string(),
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }

    async fn json<T: DeserializeOwned>(response: Response, path: &str) -> Result<T, ProviderError> {
        response.json().await.map_err(|e| ProviderError::Api {
            provider: PROVIDER,
            path: path.to_string(),
            status: 200,
            message: format!("could not decode response: {e}"),
        })
    }

    /// Create a stopped server.
    pub async fn create_server(
        &self,
        request: &CreateServerRequest<'_>,
    ) -> Result<Server, ProviderError> {
        let path = "/servers";
        debug!(name = request.name, "Creating scaleway server");

        let response = self
            .inner
            .post(self.url(path))
            .header("X-Auth-Token", &self.secret_key)
            .json(request)
            .send()
            .await?;
        let envelope: ServerEnvelope = Self::json(Self::check(response, path).await?, path).await?;
        Ok(envelope.server)
    }

    /// Reserve a public IPv4 and attach it to `server_id`.
    pub async fn attach_ip(
        &self,
        scope: Scope<'_>,
        server_id: &str,
        tags: &[String],
    ) -> Result<Ip, ProviderError> {
        let path = "/ips";
        debug!(server = server_id, "Attaching IPv4 to scaleway server");

        let request = CreateIpRequest {
            project: scope.project,
            organization: scope.organization,
            server: server_id,
            tags,
        };
        let response = self
            .inner
            .post(self.url(path))
            .header("X-Auth-Token", &self.secret_key)
            .json(&request)
            .send()
            .await?;
        let envelope: IpEnvelope = Self::json(Self::check(response, path).await?, path).await?;
        Ok(envelope.ip)
    }

    /// Upload cloud-init user data, run at first boot.
    pub async fn set_cloud_init(&self, server_id: &str, content: String) -> Result<(), ProviderError> {
        let path = format!("/servers/{server_id}/user_data/cloud-init");
        debug!(server = server_id, "Setting scaleway cloud-init");

        let response = self
            .inner
            .patch(self.url(&path))
            .header("X-Auth-Token", &self.secret_key)
            .header(reqwest::header::CONTENT_TYPE, "text/plain")
            .body(content)
            .send()
            .await?;
        Self::check(response, &path).await?;
        Ok(())
    }

    /// Send a server action (`poweron`, `terminate`, ...).
    pub async fn action(&self, server_id: &str, action: &str) -> Result<(), ProviderError> {
        let path = format!("/servers/{server_id}/action");
        debug!(server = server_id, action, "Sending scaleway server action");

        let response = self
            .inner
            .post(self.url(&path))
            .header("X-Auth-Token", &self.secret_key)
            .json(&ActionRequest { action })
            .send()
            .await?;
        Self::check(response, &path).await?;
        Ok(())
    }

    /// Delete a stopped server.
    pub async fn delete_server(&self, server_id: &str) -> Result<(), ProviderError> {
        let path = format!("/servers/{server_id}");
        debug!(server = server_id, "Deleting scaleway server");

        let response = self
            .inner
            .delete(self.url(&path))
            .header("X-Auth-Token", &self.secret_key)
            .send()
            .await?;
        Self::check(response, &path).await?;
        Ok(())
    }

    /// Fetch a server by id. A missing server is [`ProviderError::NotFound`].
    pub async fn get_server(&self, server_id: &str) -> Result<Server, ProviderError> {
        let path = format!("/servers/{server_id}");

        let response = self
            .inner
            .get(self.url(&path))
            .header("X-Auth-Token", &self.secret_key)
            .send()
            .await?;
        let envelope: ServerEnvelope =
            Self::json(Self::check(response, &path).await?, &path).await?;
        Ok(envelope.server)
    }

    /// List servers whose name contains `name`.
    ///
    /// The API filters by substring: `server1` also returns `server100`.
    pub async fn list_servers(
        &self,
        scope: Scope<'_>,
        name: &str,
    ) -> Result<Vec<Server>, ProviderError> {
        let path = "/servers";
        debug!(name, "Looking up scaleway servers by name");

        let mut query = vec![("name", name), ("per_page", "100")];
        if let Some(project) = scope.project {
            query.push(("project", project));
        }
        let response = self
            .inner
            .get(self.url(path))
            .header("X-Auth-Token", &self.secret_key)
            .query(&query)
            .send()
            .await?;
        let envelope: ServersEnvelope = Self::json(Self::check(response, path).await?, path).await?;
        Ok(envelope.servers)
    }
}

/// Pick the server named exactly `name` out of a substring match.
pub(crate) fn exact_match(servers: Vec<Server>, name: &str) -> Result<Option<Server>, ProviderError> {
    let mut matched: Vec<Server> = servers.into_iter().filter(|s| s.name == name).collect();
    match matched.len() {
        0 => Ok(None),
        1 => Ok(matched.pop()),
        count => Err(ProviderError::Ambiguous {
            name: name.to_string(),
            count,
        }),
    }
}
