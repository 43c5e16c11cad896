// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The ACP server core: session admission, method routing, tool dispatch
//! through the priority queue, and resource subscriptions.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use crate::config::{Capabilities, Config};
use crate::error::{access_denied_data, RpcCode};
use crate::queue::{Job, Priority, QueueSettings, RequestQueue};
use crate::resource::{self, ReadError, ResourceUri};
use crate::rpc::{parse_request, Request, Response, RpcError, PROTOCOL_VERSION};
use crate::session::{AdmissionSettings, Session, SessionManager, SessionMode};
use crate::tasks::{TaskLimits, TaskManager};
use crate::tools::{self, ToolCtx, ToolRegistry, ToolSettings};
use crate::transport::SlowClientPolicy;
use crate::ui::UiBridge;
use crate::watcher;

/// Server name reported from `initialize`.
pub const SERVER_NAME: &str = "fluffyui";

/// Settings the transports and watcher read off the server.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub caps: Capabilities,
    pub max_pending_events: usize,
    pub slow_client_policy: SlowClientPolicy,
    pub watch_interval: Duration,
    pub auth_token: Option<String>,
}

pub struct AcpServer {
    pub settings: ServerSettings,
    pub sessions: SessionManager,
    pub tools: ToolRegistry,
    pub queue: Arc<RequestQueue>,
    pub tasks: Arc<TaskManager>,
    pub bridge: UiBridge,
    pub shutdown: CancellationToken,
    tool_settings: ToolSettings,
}

#[derive(Debug, Default, Deserialize)]
struct InitializeParams {
    #[serde(default, rename = "protocolVersion")]
    protocol_version: Option<String>,
    #[serde(default, rename = "clientInfo")]
    client_info: Option<ClientInfo>,
    #[serde(default)]
    capabilities: Option<Value>,
    #[serde(default)]
    auth: Option<AuthParams>,
    #[serde(default)]
    mode: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ClientInfo {
    name: String,
    #[serde(default)]
    version: String,
}

#[derive(Debug, Deserialize)]
struct AuthParams {
    token: String,
}

#[derive(Debug, Deserialize)]
struct CallParams {
    name: String,
    #[serde(default)]
    arguments: Value,
}

#[derive(Debug, Deserialize)]
struct UriParams {
    uri: String,
}

fn decode_params<T: DeserializeOwned>(params: Option<Value>) -> Result<T, RpcError> {
    let value = params.unwrap_or_else(|| Value::Object(serde_json::Map::new()));
    serde_json::from_value(value)
        .map_err(|e| RpcCode::InvalidParams.to_error(format!("invalid params: {e}")))
}

impl AcpServer {
    /// Build the core and start its background machinery (queue workers and
    /// the resource watcher). The UI loop serving `bridge` is the host's.
    pub fn new(config: &Config, bridge: UiBridge) -> Arc<Self> {
        let shutdown = CancellationToken::new();

        let sessions = SessionManager::new(AdmissionSettings {
            max_sessions: config.max_sessions,
            session_timeout: config.session_timeout(),
            rate_limit: config.rate_limit,
            rate_burst: config.rate_burst,
            auth_token: config.auth_token.clone(),
        });

        let queue = RequestQueue::new(QueueSettings {
            request_timeout: config.request_timeout(),
            global_rate: config.global_rate,
            global_burst: 0,
            max_depth: config.queue_depth,
            max_inflight_per_session: config.max_inflight,
        });
        queue.spawn_workers(config.workers, shutdown.clone());

        let tasks = Arc::new(TaskManager::new(TaskLimits {
            max_background_tasks: config.max_background_tasks,
            max_tasks_per_session: config.max_tasks_per_session,
        }));

        let server = Arc::new(Self {
            settings: ServerSettings {
                caps: config.capabilities(),
                max_pending_events: config.max_pending_events,
                slow_client_policy: config.slow_policy(),
                watch_interval: config.watch_interval(),
                auth_token: config.auth_token.clone(),
            },
            sessions,
            tools: tools::build_registry(),
            queue,
            tasks,
            bridge,
            shutdown,
            tool_settings: ToolSettings {
                app_name: SERVER_NAME.to_owned(),
                app_version: env!("CARGO_PKG_VERSION").to_owned(),
                async_tools: config.async_tools,
            },
        });
        watcher::spawn(Arc::clone(&server));
        server
    }

    /// Parse and handle one framed line. `None` when no response is due
    /// (client notification).
    pub async fn handle_line(self: &Arc<Self>, session: &Arc<Session>, line: &str) -> Option<Value> {
        let response = match parse_request(line) {
            Ok(req) => self.handle_request(session, req).await?,
            Err(e) => Response::err(None, e),
        };
        Some(serde_json::to_value(&response).unwrap_or(Value::Null))
    }

    /// Admit and route one request. `None` for client notifications.
    pub async fn handle_request(
        self: &Arc<Self>,
        session: &Arc<Session>,
        req: Request,
    ) -> Option<Response> {
        // Requests without an id are notifications; nothing is owed back.
        let id = req.id.clone()?;

        if let Err(e) = self.sessions.admit(session, &req.method).await {
            tracing::debug!(session = %session.id, method = %req.method, error = %e, "request refused");
            return Some(Response::err(Some(id), e.to_rpc_error()));
        }

        let result = match req.method.as_str() {
            "initialize" => self.initialize(session, req.params).await,
            "ping" => Ok(json!({})),
            "tools/list" => Ok(json!({ "tools": self.tools.list() })),
            "tools/call" => self.tools_call(session, req.params).await,
            "resources/list" => Ok(json!({ "resources": resource::list_resources() })),
            "resources/templates/list" => {
                Ok(json!({ "resourceTemplates": resource::list_templates() }))
            }
            "resources/read" => self.resources_read(session, req.params).await,
            "resources/subscribe" => self.subscribe(session, req.params, true).await,
            "resources/unsubscribe" => self.subscribe(session, req.params, false).await,
            other => Err(RpcCode::MethodNotFound.to_error(format!("unknown method: {other}"))),
        };

        Some(match result {
            Ok(value) => Response::ok(Some(id), value),
            Err(error) => Response::err(Some(id), error),
        })
    }

    async fn initialize(
        &self,
        session: &Arc<Session>,
        params: Option<Value>,
    ) -> Result<Value, RpcError> {
        let params: InitializeParams = decode_params(params)?;

        let token = params.auth.as_ref().map(|a| a.token.as_str());
        self.sessions
            .authenticate(session, token)
            .map_err(|e| e.to_rpc_error())?;

        if let Some(ref mode) = params.mode {
            session.set_mode(SessionMode::parse(mode));
        }
        if let Some(ref client) = params.client_info {
            tracing::info!(
                session = %session.id,
                client = %client.name,
                version = %client.version,
                requested = params.protocol_version.as_deref().unwrap_or("unversioned"),
                "session initialized"
            );
        }
        let _ = params.capabilities;

        Ok(json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {
                "tools": {},
                "resources": { "subscribe": true },
            },
            "serverInfo": {
                "name": SERVER_NAME,
                "version": env!("CARGO_PKG_VERSION"),
            },
        }))
    }

    async fn tools_call(
        self: &Arc<Self>,
        session: &Arc<Session>,
        params: Option<Value>,
    ) -> Result<Value, RpcError> {
        let params: CallParams = decode_params(params)?;

        let priority = self
            .tools
            .get(&params.name)
            .and_then(|def| def.priority)
            .unwrap_or_else(|| Priority::from_mode(session.mode()));

        let cancel = session.cancel.child_token();
        let job_cancel = cancel.clone();
        let server = Arc::clone(self);
        let job_session = Arc::clone(session);
        let job: Job = Box::pin(async move {
            let ctx = ToolCtx {
                tool: &params.name,
                session: &job_session,
                bridge: &server.bridge,
                tasks: &server.tasks,
                caps: &server.settings.caps,
                settings: &server.tool_settings,
                cancel: &job_cancel,
            };
            tools::dispatch(&server.tools, &ctx, params.arguments).await
        });

        self.queue.submit(session, priority, cancel, job).await
    }

    async fn resources_read(
        &self,
        session: &Arc<Session>,
        params: Option<Value>,
    ) -> Result<Value, RpcError> {
        let params: UriParams = decode_params(params)?;
        let uri = ResourceUri::parse(&params.uri)
            .map_err(|e| RpcCode::InvalidParams.to_error(e.to_string()))?;

        let cancel = session.cancel.child_token();
        match resource::read(&self.bridge, &self.settings.caps, &cancel, &uri).await {
            Ok(content) => Ok(json!({ "contents": [content] })),
            Err(ReadError::Denied { reason, hint }) => Err(RpcCode::AccessDenied
                .with_data("access denied", access_denied_data("resources/read", &reason, &hint))),
            Err(ReadError::NotFound(what)) => {
                Err(RpcCode::RequestFailed.to_error(format!("not found: {what}")))
            }
            Err(ReadError::Cancelled) => Err(RpcCode::RequestFailed.to_error("read cancelled")),
            Err(ReadError::Ui(message)) => Err(RpcCode::RequestFailed.to_error(message)),
        }
    }

    /// Subscription admission is pre-checked here; the watcher assumes every
    /// recorded URI already passed its capability gate.
    async fn subscribe(
        &self,
        session: &Arc<Session>,
        params: Option<Value>,
        subscribe: bool,
    ) -> Result<Value, RpcError> {
        let params: UriParams = decode_params(params)?;
        let uri = ResourceUri::parse(&params.uri)
            .map_err(|e| RpcCode::InvalidParams.to_error(e.to_string()))?;

        if subscribe {
            if let Err(ReadError::Denied { reason, hint }) =
                resource::check_access(&uri, &self.settings.caps)
            {
                return Err(RpcCode::AccessDenied.with_data(
                    "access denied",
                    access_denied_data("resources/subscribe", &reason, &hint),
                ));
            }
            session.subscribe(&uri.to_string()).await;
        } else {
            session.unsubscribe(&uri.to_string()).await;
        }
        Ok(json!({}))
    }

    /// Connection teardown: unregister the session, cancel its tasks, and
    /// drop its task records.
    pub async fn teardown(&self, session: &Arc<Session>) {
        self.sessions.unregister(&session.id).await;
        self.tasks.cancel_session(&session.id).await;
        self.tasks.remove_session(&session.id).await;
        tracing::debug!(session = %session.id, "session torn down");
    }
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
