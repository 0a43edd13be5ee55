//! Main Language Server Protocol server implementation for haml-lint
//!
//! Diagnostics come from haml-lint runs over the unsaved buffer, debounced
//! while typing and immediate on open and save. Formatting runs haml-lint's
//! auto-correct plus the in-process rewrites, either on request or in the
//! background after a save.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::RwLock;
use tower_lsp::jsonrpc::Result as JsonRpcResult;
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer};

use crate::config::{CheckerContext, Settings};
use crate::config_patch::{self, ConfigDialect, PatchOutcome};
use crate::diagnostics::{finding_to_diagnostic, parse_report};
use crate::format::{
    BackgroundFormatter, FormatMode, FormatPipeline, FormatRequest, InFlight, context_for, document_file_name,
};
use crate::lsp::debounce::Debouncer;
use crate::lsp::documents::DocumentStore;
use crate::lsp::host::LspHost;
use crate::lsp::types::{DISABLE_RULE_COMMAND, DisableRuleArgs, disable_rule_action};
use crate::runner::{Checker, FailureKind, HamlLintRunner};

/// Language server wrapping the external haml-lint checker.
///
/// All state lives behind `Arc`s so the server can be cloned into spawned
/// tasks (debounced linting, background formatting).
#[derive(Clone)]
pub struct HamlLintLanguageServer {
    client: Client,
    settings: Arc<RwLock<Settings>>,
    /// `server --config`, used whenever the client sets no `configPath`
    default_config_path: Option<String>,
    workspace_root: Arc<RwLock<Option<PathBuf>>>,
    documents: DocumentStore,
    checker: Arc<dyn Checker>,
    pipeline: FormatPipeline,
    background: BackgroundFormatter,
    in_flight: InFlight,
    debouncer: Debouncer,
}

impl HamlLintLanguageServer {
    pub fn new(client: Client, config_path: Option<String>) -> Self {
        let mut server = Self::with_checker(client, Arc::new(HamlLintRunner::new()));
        server.default_config_path = config_path;
        server.settings = Arc::new(RwLock::new(server.with_defaults(Settings::default())));
        server
    }

    /// Build a server around any [`Checker`].
    pub fn with_checker(client: Client, checker: Arc<dyn Checker>) -> Self {
        let documents = DocumentStore::new();
        let in_flight = InFlight::new();
        let pipeline = FormatPipeline::new(Arc::clone(&checker));
        let host = Arc::new(LspHost::new(client.clone(), documents.clone()));
        let background = BackgroundFormatter::new(pipeline.clone(), in_flight.clone(), host);

        Self {
            client,
            settings: Arc::new(RwLock::new(Settings::default())),
            default_config_path: None,
            workspace_root: Arc::new(RwLock::new(None)),
            documents,
            checker,
            pipeline,
            background,
            in_flight,
            debouncer: Debouncer::new(),
        }
    }

    pub async fn settings(&self) -> Settings {
        self.settings.read().await.clone()
    }

    /// Fill in what the client left unset from the command line.
    fn with_defaults(&self, mut settings: Settings) -> Settings {
        if settings.config_path.is_none() {
            settings.config_path = self.default_config_path.clone();
        }
        settings
    }

    async fn context(&self, settings: &Settings, uri: &Url) -> CheckerContext {
        let root = self.workspace_root.read().await.clone();
        context_for(settings, uri, root.as_deref())
    }

    /// Lint a document and return diagnostics for the version linted.
    ///
    /// `surface_errors` shows setup problems (missing executable, Ruby,
    /// gems) to the user instead of only logging them.
    async fn lint_document(&self, uri: &Url, surface_errors: bool) -> Option<(Vec<Diagnostic>, i32)> {
        let settings = self.settings().await;
        if !settings.enable_diagnostics {
            return None;
        }
        let (text, version) = self.documents.snapshot(uri).await?;
        let ctx = self.context(&settings, uri).await;

        match self
            .checker
            .run(&text, &document_file_name(uri), &ctx.lint_options(&settings))
            .await
        {
            Ok(result) => {
                let diagnostics = parse_report(&result.stdout)
                    .iter()
                    .map(|finding| finding_to_diagnostic(finding, &text))
                    .collect();
                Some((diagnostics, version))
            }
            Err(e) => {
                log::warn!("Failed to lint {uri}: {e}");
                if surface_errors && e.kind() != FailureKind::Other {
                    self.client.show_message(MessageType::ERROR, e.user_message()).await;
                }
                None
            }
        }
    }

    /// Update diagnostics for a document, unless it changed while linting.
    async fn update_diagnostics(&self, uri: Url, surface_errors: bool) {
        let Some((diagnostics, version)) = self.lint_document(&uri, surface_errors).await else {
            return;
        };
        if self.documents.version(&uri).await != Some(version) {
            log::debug!("Dropping stale diagnostics for {uri}");
            return;
        }
        self.client.publish_diagnostics(uri, diagnostics, Some(version)).await;
    }

    fn schedule_diagnostics(&self, uri: Url, settings: &Settings) {
        let this = self.clone();
        let target = uri.clone();
        self.debouncer.schedule(uri, settings.debounce(), async move {
            this.update_diagnostics(target, false).await;
        });
    }

    async fn relint_all(&self) {
        for uri in self.documents.uris().await {
            self.update_diagnostics(uri, false).await;
        }
    }

    async fn disable_rule(&self, args: DisableRuleArgs) {
        let settings = self.settings().await;
        let ctx = self.context(&settings, &args.uri).await;

        let target = match args.dialect {
            ConfigDialect::HamlLint => ctx.config_path.clone(),
            ConfigDialect::Rubocop => None,
        }
        .or_else(|| ctx.project_file(args.dialect.default_file_name()));

        let Some(path) = target else {
            self.client
                .show_message(
                    MessageType::ERROR,
                    format!("haml-lint: no project directory to write a config file for {}", args.uri),
                )
                .await;
            return;
        };

        match config_patch::disable_rule(&path, &args.rule, args.dialect).await {
            Ok(PatchOutcome::Disabled) => {
                self.client
                    .show_message(
                        MessageType::INFO,
                        format!("Disabled {} in {}", args.rule, path.display()),
                    )
                    .await;
                self.relint_all().await;
            }
            Ok(PatchOutcome::AlreadyDisabled) => {
                self.client
                    .show_message(
                        MessageType::INFO,
                        format!("{} is already disabled in {}", args.rule, path.display()),
                    )
                    .await;
            }
            Err(e) => {
                log::error!("{e}");
                self.client.show_message(MessageType::ERROR, format!("haml-lint: {e}")).await;
            }
        }
    }
}

#[tower_lsp::async_trait]
impl LanguageServer for HamlLintLanguageServer {
    async fn initialize(&self, params: InitializeParams) -> JsonRpcResult<InitializeResult> {
        log::info!("Initializing haml-lint Language Server");

        if let Some(options) = params.initialization_options {
            match Settings::from_value(options) {
                Ok(settings) => *self.settings.write().await = self.with_defaults(settings),
                Err(e) => log::warn!("Ignoring invalid initialization options: {e}"),
            }
        }

        #[allow(deprecated)]
        let root = params
            .workspace_folders
            .as_ref()
            .and_then(|folders| folders.first())
            .and_then(|folder| folder.uri.to_file_path().ok())
            .or_else(|| params.root_uri.as_ref().and_then(|uri| uri.to_file_path().ok()))
            .or_else(|| params.root_path.as_ref().map(PathBuf::from));
        *self.workspace_root.write().await = root;

        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Options(TextDocumentSyncOptions {
                    open_close: Some(true),
                    change: Some(TextDocumentSyncKind::FULL),
                    save: Some(TextDocumentSyncSaveOptions::SaveOptions(SaveOptions {
                        include_text: Some(false),
                    })),
                    ..Default::default()
                })),
                document_formatting_provider: Some(OneOf::Left(true)),
                code_action_provider: Some(CodeActionProviderCapability::Options(CodeActionOptions {
                    code_action_kinds: Some(vec![CodeActionKind::QUICKFIX]),
                    ..Default::default()
                })),
                execute_command_provider: Some(ExecuteCommandOptions {
                    commands: vec![DISABLE_RULE_COMMAND.to_string()],
                    work_done_progress_options: WorkDoneProgressOptions::default(),
                }),
                ..Default::default()
            },
            server_info: Some(ServerInfo {
                name: "haml-lint-lsp".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        log::info!("haml-lint Language Server initialized");

        self.client
            .log_message(MessageType::INFO, "haml-lint Language Server started")
            .await;
    }

    async fn shutdown(&self) -> JsonRpcResult<()> {
        log::info!("Shutting down haml-lint Language Server");
        self.debouncer.cancel_all();
        self.in_flight.clear();
        self.documents.clear().await;
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let doc = params.text_document;
        self.documents.upsert(doc.uri.clone(), doc.text, doc.version).await;
        self.update_diagnostics(doc.uri, true).await;
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let uri = params.text_document.uri;

        // FULL sync: the last change carries the whole text
        if let Some(change) = params.content_changes.into_iter().last() {
            self.documents
                .upsert(uri.clone(), change.text, params.text_document.version)
                .await;

            let settings = self.settings().await;
            self.schedule_diagnostics(uri, &settings);
        }
    }

    async fn did_save(&self, params: DidSaveTextDocumentParams) {
        let uri = params.text_document.uri;
        let settings = self.settings().await;

        self.debouncer.cancel(&uri);
        self.update_diagnostics(uri.clone(), true).await;

        if settings.format_on_save && settings.enable_formatting {
            let ctx = self.context(&settings, &uri).await;
            // Fire and forget; staleness is handled inside the task.
            let _ = self.background.spawn(uri, settings, ctx);
        }
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;
        self.debouncer.cancel(&uri);
        self.documents.remove(&uri).await;
        self.client.publish_diagnostics(uri, Vec::new(), None).await;
    }

    async fn did_change_configuration(&self, params: DidChangeConfigurationParams) {
        match Settings::from_value(params.settings) {
            Ok(settings) => {
                *self.settings.write().await = self.with_defaults(settings);
                log::info!("Settings updated");
                self.relint_all().await;
            }
            Err(e) => log::warn!("Ignoring invalid settings: {e}"),
        }
    }

    async fn formatting(&self, params: DocumentFormattingParams) -> JsonRpcResult<Option<Vec<TextEdit>>> {
        let uri = params.text_document.uri;
        let settings = self.settings().await;
        if !settings.enable_formatting {
            return Ok(None);
        }

        let Some((text, version)) = self.documents.snapshot(&uri).await else {
            log::debug!("Formatting requested for unopened document {uri}");
            return Ok(None);
        };
        let ctx = self.context(&settings, &uri).await;
        let request = FormatRequest {
            uri,
            version,
            text,
            mode: FormatMode::Foreground,
        };

        match self.pipeline.foreground(&request, &settings, &ctx).await {
            Ok(edits) => Ok(edits),
            Err(e) => {
                log::error!("Failed to format {}: {e}", request.uri);
                self.client.show_message(MessageType::ERROR, e.user_message()).await;
                Ok(None)
            }
        }
    }

    async fn code_action(&self, params: CodeActionParams) -> JsonRpcResult<Option<CodeActionResponse>> {
        let uri = params.text_document.uri;
        let actions: Vec<CodeActionOrCommand> = params
            .context
            .diagnostics
            .iter()
            .filter_map(|diagnostic| disable_rule_action(diagnostic, &uri))
            .map(CodeActionOrCommand::CodeAction)
            .collect();

        Ok((!actions.is_empty()).then_some(actions))
    }

    async fn execute_command(&self, params: ExecuteCommandParams) -> JsonRpcResult<Option<serde_json::Value>> {
        if params.command != DISABLE_RULE_COMMAND {
            log::warn!("Unknown command: {}", params.command);
            return Ok(None);
        }

        match DisableRuleArgs::from_arguments(params.arguments) {
            Some(args) => self.disable_rule(args).await,
            None => log::warn!("Invalid arguments for {DISABLE_RULE_COMMAND}"),
        }
        Ok(None)
    }
}

impl std::fmt::Debug for HamlLintLanguageServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HamlLintLanguageServer")
            .field("documents", &self.documents)
            .field("in_flight", &self.in_flight)
            .finish_non_exhaustive()
    }
}
