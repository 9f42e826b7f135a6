//! High-level client API.

use crate::config::ClientConfig;
use crate::connection::Transport;
use crate::error::ClientError;
use crate::reply::{Delivery, Reply};
use crate::subscription::{MessageCallback, SubscriptionHandle};
use tessera_protocol::{build, build_admin, CommandOptions, Credentials, RequestContext, Target};

/// High-level client for a tessera engine.
///
/// Builds envelopes from a command name and options, then hands them to the
/// transport. Construction problems are returned as [`ClientError`] before
/// any connection is made; everything after that arrives as a [`Reply`].
pub struct Client {
    config: ClientConfig,
    transport: Transport,
}

impl Client {
    /// Creates a new client with the given configuration.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        config.validate()?;
        let transport = Transport::new(config.transport_config())?;
        Ok(Self { config, transport })
    }

    /// Creates a client from `TESSERA_CONFIG` and `TESSERA_*` variables.
    pub fn from_env() -> Result<Self, ClientError> {
        Self::new(ClientConfig::load()?)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn credentials(&self) -> &Credentials {
        &self.config.credentials
    }

    /// Returns a target for `keyspace` in the configured store.
    pub fn target(&self, keyspace: impl Into<String>) -> Target {
        let target = Target::new(&self.config.store, keyspace);
        match &self.config.namespace {
            Some(namespace) => target.with_namespace(namespace),
            None => target,
        }
    }

    /// Builds and sends `command` against `target`.
    ///
    /// Subscription commands return a handle feeding `on_message`; other
    /// commands return their reply.
    pub async fn execute(
        &self,
        target: &Target,
        command: &str,
        options: &CommandOptions,
        on_message: Option<MessageCallback>,
    ) -> Result<Delivery, ClientError> {
        let context = RequestContext::new(self.config.credentials.clone(), target.clone(), command);
        let message = build(&context, options)?;
        tracing::debug!("Sending command {} to keyspace {}", command, target.keyspace);
        Ok(self.transport.send(command, &message, on_message).await)
    }

    /// Sends a one-shot command and waits for its reply.
    pub async fn request(
        &self,
        target: &Target,
        command: &str,
        options: &CommandOptions,
    ) -> Result<Reply, ClientError> {
        let context = RequestContext::new(self.config.credentials.clone(), target.clone(), command);
        let message = build(&context, options)?;
        Ok(self.transport.request(&message).await)
    }

    /// Starts a subscription regardless of the command name.
    ///
    /// Returns the connect failure as a reply when the stream could not be
    /// opened.
    pub async fn subscribe(
        &self,
        target: &Target,
        command: &str,
        options: &CommandOptions,
        on_message: MessageCallback,
    ) -> Result<Result<SubscriptionHandle, Reply>, ClientError> {
        let context = RequestContext::new(self.config.credentials.clone(), target.clone(), command);
        let message = build(&context, options)?;
        Ok(match self.transport.subscribe(&message, Some(on_message)).await {
            Delivery::Subscription(handle) => Ok(handle),
            Delivery::Reply(reply) => Err(reply),
        })
    }

    /// Sends an administrative command given as positional tokens.
    pub async fn admin<I, T>(&self, tokens: I) -> Result<Reply, ClientError>
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let message = build_admin(tokens, &self.config.credentials)?;
        Ok(self.transport.request(&message).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reply::Failure;
    use serde_json::{json, Value};
    use tessera_protocol::{ConstructionError, Key};
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;

    /// Serves one connection: returns the request line and answers `reply`.
    async fn serve_once(reply: &'static str) -> (ClientConfig, tokio::task::JoinHandle<Value>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mut config = ClientConfig::default();
        config.connection.port = listener.local_addr().unwrap().port();
        config.credentials = Credentials::new("alice", "secret");
        config.store = "inventory".to_string();

        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut reader = BufReader::new(socket);
            let mut line = String::new();
            reader.read_line(&mut line).await.unwrap();
            reader.get_mut().write_all(reply.as_bytes()).await.unwrap();
            serde_json::from_str(&line).unwrap()
        });
        (config, server)
    }

    #[test]
    fn test_client_creation() {
        let client = Client::new(ClientConfig::default()).unwrap();
        assert_eq!(client.credentials(), &Credentials::default());

        let target = client.target("items");
        assert_eq!(target.store, "default");
        assert_eq!(target.keyspace, "items");
        assert!(target.namespace.is_none());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = ClientConfig::default();
        config.connection.port = 0;
        assert!(matches!(Client::new(config), Err(ClientError::Config(_))));
    }

    #[tokio::test]
    async fn test_construction_error_before_network() {
        // Nothing listens on this port; the error must come from the builder.
        let mut config = ClientConfig::default();
        config.connection.port = 1;
        let client = Client::new(config).unwrap();
        let options = CommandOptions::new()
            .with_pointers(true)
            .with_pointers_metadata(true);

        let err = client
            .request(&client.target("items"), "get", &options)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ClientError::Construction(ConstructionError::ConflictingFlags)
        ));
    }

    #[tokio::test]
    async fn test_execute_round_trip() {
        let (config, server) = serve_once("{\"value\":\"{\\\"qty\\\":3}\"}\n").await;
        let client = Client::new(config).unwrap();
        let options = CommandOptions::new().with_key(Key::custom("sku-1"));

        let delivery = client
            .execute(&client.target("items"), "get", &options, None)
            .await
            .unwrap();

        assert_eq!(
            delivery.into_reply(),
            Some(Reply::Message(json!({"value": {"qty": 3}})))
        );
        let request = server.await.unwrap();
        assert_eq!(request["command"], "get");
        assert_eq!(request["username"], "alice");
        assert_eq!(request["store"], "inventory");
        assert_eq!(request["keyspace"], "items");
        assert_eq!(request["key"], tessera_protocol::hash("sku-1"));
    }

    #[tokio::test]
    async fn test_admin_envelope() {
        let (config, server) = serve_once("{\"ok\":true}\n").await;
        let client = Client::new(config).unwrap();

        let reply = client.admin(["create_store", "inventory"]).await.unwrap();

        assert_eq!(reply, Reply::Message(json!({"ok": true})));
        assert_eq!(
            server.await.unwrap(),
            json!({"raw": ["create_store", "inventory"], "credentials": ["alice", "secret"]})
        );
    }

    #[tokio::test]
    async fn test_admin_requires_command() {
        let client = Client::new(ClientConfig::default()).unwrap();
        let err = client.admin(Vec::<String>::new()).await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Construction(ConstructionError::MissingCommand)
        ));
    }

    #[tokio::test]
    async fn test_subscribe_connect_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mut config = ClientConfig::default();
        config.connection.port = listener.local_addr().unwrap().port();
        drop(listener);
        let client = Client::new(config).unwrap();

        let result = client
            .subscribe(
                &client.target("items"),
                "subscribe",
                &CommandOptions::new(),
                Box::new(|_| {}),
            )
            .await
            .unwrap();

        match result {
            Err(Reply::Failure(Failure::Connect(_))) => {}
            other => panic!("expected connect failure, got {:?}", other),
        }
    }
}
