//! Command line front end. `list` searches the user's requests; every other
//! command opens the request page, lets the first timeline load finish and
//! then drives the page through its actions.

mod format;

use std::collections::HashSet;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

use clap::{ArgGroup, Parser, Subcommand};
use tokio::time::Sleep;

use crate::components::request::ActionHandlers;
use crate::components::{comment_editor, timeline, timeline_event};
use crate::components::{Action, RequestPage, State};
use crate::environment::{
    repository, Config, Environment, Error, Model, Repository, RequestSearch, RequestsApi, Result,
};
use crate::store::StoreHandle;
use crate::view_model::{EventId, Request};

use format::{format_error, format_event, format_page, format_request, format_request_list};

type Store = StoreHandle<RequestPage>;

/// Follow the timeline of a repository request from the terminal.
#[derive(Debug, Parser)]
#[command(name = "requests-feed", version)]
#[command(group(ArgGroup::new("source").args(["url", "request_file"])))]
pub struct Cli {
    /// API url of the request, e.g. https://host/api/requests/<id>
    #[arg(long)]
    url: Option<String>,

    /// Read the request from a JSON file instead of fetching it
    #[arg(long)]
    request_file: Option<PathBuf>,

    /// Config file, defaults to config.json in the platform config directory
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Access token, overrides the configured one
    #[arg(long, global = true)]
    token: Option<String>,

    /// Timeline refresh interval in milliseconds
    #[arg(long, global = true)]
    interval: Option<u64>,

    /// Events per timeline page
    #[arg(long, global = true)]
    page_size: Option<u32>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the request and the first timeline page
    Show,
    /// Print new timeline events as they arrive, until Ctrl-C
    Watch,
    /// Print a specific timeline page
    Page { page: u32 },
    /// Add a comment
    Comment {
        text: String,
        #[arg(long, default_value = comment_editor::DEFAULT_FORMAT)]
        format: String,
    },
    /// Change the content of a comment
    Edit {
        event_id: String,
        text: String,
        #[arg(long, default_value = comment_editor::DEFAULT_FORMAT)]
        format: String,
    },
    /// Delete a comment
    Delete { event_id: String },
    /// Perform an action on the request, e.g. accept or decline
    Action {
        name: String,
        /// Comment sent along with the action
        #[arg(long)]
        comment: Option<String>,
    },
    /// List requests, no request source needed
    List {
        /// Search text
        query: Option<String>,
        /// Only open requests
        #[arg(long, conflicts_with = "closed")]
        open: bool,
        /// Only closed requests
        #[arg(long)]
        closed: bool,
        /// Requests shared with me instead of my own
        #[arg(long)]
        shared: bool,
        #[arg(long, default_value_t = 1)]
        page: u32,
        /// Search endpoint, overrides `requests_url` from the config
        #[arg(long)]
        search_url: Option<String>,
    },
}

impl Command {
    fn opens_request(&self) -> bool {
        !matches!(self, Command::List { .. })
    }
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(execute(cli))
}

fn init_logging() {
    use env_logger::Env;
    use std::io::Write;
    env_logger::Builder::from_env(Env::default().default_filter_or("requests_feed=debug"))
        .format(|buf, record| {
            writeln!(
                buf,
                "{}:{} {} [{}] - {}",
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                chrono::Local::now().format("%Y-%m-%dT%H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .target(env_logger::Target::Stderr)
        .init();
}

async fn execute(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    let model = Arc::new(Model::new(&config)?);
    if let Command::List {
        query,
        open,
        closed,
        shared,
        page,
        search_url,
    } = &cli.command
    {
        let url = search_url
            .clone()
            .or_else(|| config.requests_url.clone())
            .ok_or_else(|| {
                Error::Config("no search url, set requests_url or pass --search-url".to_string())
            })?;
        let is_open = match (*open, *closed) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        };
        let search = RequestSearch::default()
            .with_size(config.page_size)?
            .with_page(*page)?
            .with_query(query.clone())
            .with_open(is_open)
            .shared_with_me(*shared);
        return list(&*model, &url, &search).await;
    }
    check_source(&cli)?;
    let request = match (&cli.request_file, &cli.url) {
        (Some(path), _) => repository::read::<Request>(path)?
            .ok_or_else(|| Error::Config(format!("{} does not exist", path.display())))?,
        (None, Some(url)) => model.fetch_request_at(url).await?.data,
        (None, None) => return Err(Error::Config("no request given".to_string())),
    };
    log::debug!("opened request {}", request.id);

    let state = State::new(request, &config);
    let store: Store = StoreHandle::spawn(state, Environment::new(model, config));
    let state = store
        .wait_until(|s| !s.timeline.loading && (s.timeline.page.is_some() || s.timeline.error.is_some()))
        .await;
    if let Some(error) = &state.timeline.error {
        return Err(error.clone());
    }

    let result = match cli.command {
        Command::Show => {
            print_page(&state);
            Ok(())
        }
        Command::Watch => watch(&store).await,
        Command::Page { page } => show_page(&store, page).await,
        Command::Comment { text, format } => comment(&store, text, format).await,
        Command::Edit {
            event_id,
            text,
            format,
        } => edit(&store, EventId(event_id), text, format).await,
        Command::Delete { event_id } => delete(&store, EventId(event_id)).await,
        Command::Action { name, comment } => perform(&store, &name, comment).await,
        Command::List { .. } => Ok(()),
    };
    store.shutdown().await;
    result
}

fn check_source(cli: &Cli) -> Result<()> {
    if cli.command.opens_request() && cli.url.is_none() && cli.request_file.is_none() {
        return Err(Error::Config(
            "--url or --request-file is required".to_string(),
        ));
    }
    Ok(())
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => repository::read(path)?
            .ok_or_else(|| Error::Config(format!("{} does not exist", path.display())))?,
        None => Repository::from_default_directory()?.config()?,
    };
    if let Some(token) = &cli.token {
        config.access_token = Some(token.clone());
    }
    if let Some(interval) = cli.interval {
        config.refresh_interval_ms = interval;
    }
    if let Some(size) = cli.page_size {
        config.page_size = size;
    }
    config.initial_query()?;
    Ok(config)
}

fn print_page(state: &State) {
    println!("{}\n", format_request(&state.request.request));
    if let Some(page) = &state.timeline.page {
        println!("{}", format_page(page));
    }
}

async fn watch(store: &Store) -> Result<()> {
    let mut receiver = store.subscribe();
    let mut seen: HashSet<EventId> = HashSet::new();
    let mut status = None;
    let mut retry: Option<Pin<Box<Sleep>>> = None;
    // the retry was sent but the store has not published since
    let mut retry_sent = false;
    loop {
        let state = receiver.borrow_and_update().clone();
        if let Some(error) = &state.timeline.error {
            if !error.is_retryable() {
                return Err(error.clone());
            }
            if retry.is_none() && !retry_sent {
                report(error);
                retry = Some(Box::pin(tokio::time::sleep(state.timeline.refresh_interval())));
            }
        }
        if status != Some(state.request.request.status) {
            println!("{}", format_request(&state.request.request));
            status = Some(state.request.request.status);
        }
        for event in state.timeline.events() {
            if seen.insert(event.id.clone()) {
                println!("{}", format_event(event));
            }
        }
        tokio::select! {
            changed = receiver.changed() => {
                if changed.is_err() {
                    return Ok(());
                }
                retry_sent = false;
            }
            _ = async {
                if let Some(sleep) = retry.as_mut() {
                    sleep.await;
                }
            }, if retry.is_some() => {
                retry = None;
                retry_sent = true;
                store.send(Action::Timeline(timeline::Action::Retry));
            }
            _ = tokio::signal::ctrl_c() => return Ok(()),
        }
    }
}

async fn show_page(store: &Store, page: u32) -> Result<()> {
    let query = store.state().timeline.query.with_page(page)?;
    store.send(Action::Timeline(timeline::Action::ChangePage(page)));
    let state = store
        .wait_until(|s| {
            let timeline = &s.timeline;
            timeline.error.is_some()
                || (!timeline.refreshing
                    && !timeline.refetch_pending
                    && timeline.page.as_ref().is_some_and(|p| p.page == query.page))
        })
        .await;
    match state.timeline.error {
        Some(error) => Err(error),
        None => {
            print_page(&state);
            Ok(())
        }
    }
}

async fn comment(store: &Store, text: String, format: String) -> Result<()> {
    let (sender, receiver) = flume::bounded(1);
    store.send(Action::Editor(comment_editor::Action::SetContent(text)));
    store.send(Action::Editor(comment_editor::Action::Submit {
        format: Some(format),
        responder: Some(sender),
    }));
    let event = receiver
        .recv_async()
        .await
        .map_err(|_| Error::Io("request page stopped before the comment was sent".to_string()))??;
    println!("{}", format_event(&event));
    Ok(())
}

async fn edit(store: &Store, id: EventId, text: String, format: String) -> Result<()> {
    change_event(
        store,
        timeline_event::Action::Update {
            id: id.clone(),
            content: text,
            format: Some(format),
        },
        id,
    )
    .await
}

async fn delete(store: &Store, id: EventId) -> Result<()> {
    change_event(store, timeline_event::Action::Delete(id.clone()), id).await
}

/// Sends an update or delete and waits until it came back or was rejected
async fn change_event(store: &Store, action: timeline_event::Action, id: EventId) -> Result<()> {
    let before = store.state().events.finished();
    store.send(Action::Event(action));
    let state = store
        .wait_until(|s| s.events.get(&id).error.is_some() || s.events.finished() > before)
        .await;
    finish_event(&state, &id)
}

fn finish_event(state: &State, id: &EventId) -> Result<()> {
    if let Some(error) = state.events.get(id).error {
        return Err(error);
    }
    if let Some(event) = state.timeline.page.as_ref().and_then(|p| p.get(id)) {
        println!("{}", format_event(event));
    }
    Ok(())
}

async fn perform(store: &Store, name: &str, comment: Option<String>) -> Result<()> {
    let before = store.state().request.action.finished;
    let handlers = ActionHandlers::new(&store.state(), store.dispatcher());
    if !handlers.available.iter().any(|a| a == name) {
        return Err(Error::missing_link(format!("actions.{name}")));
    }
    handlers.open(name);
    handlers.perform(name, comment);
    let state = store
        .wait_until(|s| {
            let action = &s.request.action;
            action.error.is_some() || action.finished > before
        })
        .await;
    if let Some(error) = state.request.action.error {
        return Err(error);
    }
    let handlers = ActionHandlers::new(&state, store.dispatcher());
    if handlers.is_open(name) {
        log::warn!("confirmation for {name} is still open");
    }
    println!("{}", format_request(&state.request.request));
    Ok(())
}

async fn list(api: &dyn RequestsApi, url: &str, search: &RequestSearch) -> Result<()> {
    let list = api.search_requests(url, search).await?.data;
    log::debug!("{} of {} requests on page {}", list.hits.len(), list.total, list.page);
    println!("{}", format_request_list(&list, search));
    Ok(())
}

/// Prints the error the way the command line shows it
pub fn report(error: &Error) {
    eprintln!("Error: {}", format_error(error));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::mock::{
        make_closed_request, make_comment, make_comments_page, make_request, server_error, Call,
        MockApi,
    };
    use clap::CommandFactory;
    use std::time::Duration;

    #[test]
    fn cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn request_source_is_required_except_for_list() {
        let cli = Cli::try_parse_from(["requests-feed", "show"]).unwrap();
        assert!(matches!(check_source(&cli), Err(Error::Config(_))));
        let cli = Cli::try_parse_from(["requests-feed", "list", "--open", "--shared"]).unwrap();
        assert_eq!(check_source(&cli), Ok(()));
        assert!(matches!(
            cli.command,
            Command::List { open: true, closed: false, shared: true, page: 1, .. }
        ));
        assert!(Cli::try_parse_from(["requests-feed", "list", "--open", "--closed"]).is_err());
        let cli = Cli::try_parse_from([
            "requests-feed",
            "--url",
            "https://host/api/requests/1",
            "action",
            "accept",
            "--comment",
            "welcome",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Command::Action { ref name, comment: Some(ref c) } if name == "accept" && c == "welcome"
        ));
    }

    #[test]
    fn flags_override_the_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"refresh_interval_ms": 1000, "page_size": 10}"#).unwrap();
        let cli = Cli::try_parse_from([
            "requests-feed",
            "--request-file",
            "request.json",
            "--config",
            path.to_str().unwrap(),
            "--token",
            "secret",
            "--page-size",
            "50",
            "show",
        ])
        .unwrap();
        let config = load_config(&cli).unwrap();
        assert_eq!(config.refresh_interval_ms, 1000);
        assert_eq!(config.page_size, 50);
        assert_eq!(config.access_token.as_deref(), Some("secret"));
    }

    async fn loaded_store(api: MockApi) -> Store {
        let environment = Environment::new(Arc::new(api), Config::default());
        let state = State::new(make_request(), &environment.config);
        let store: Store = StoreHandle::spawn(state, environment);
        store.wait_until(|s| s.timeline.page.is_some()).await;
        store
    }

    #[tokio::test]
    async fn list_searches_with_the_filters() {
        let api = MockApi::default();
        let mut open = make_request();
        open.title = Some("Thesis".to_string());
        api.set_search_results(vec![open, make_closed_request("r2", "Thesis draft")]);
        let search = RequestSearch::default()
            .with_query(Some("Thesis".to_string()))
            .with_open(Some(false));
        let url = "https://repo.example/api/user/requests";

        assert_eq!(list(&api, url, &search).await, Ok(()));
        assert_eq!(
            api.calls(),
            vec![Call::SearchRequests {
                url: url.to_string(),
                search: search.clone(),
            }]
        );
        let found = api.search_requests(url, &search).await.unwrap().data;
        assert_eq!(found.total, 1);
        assert_eq!(found.hits[0].id.0, "r2");
    }

    #[tokio::test]
    async fn action_with_unchanged_revision_completes() {
        let api = MockApi::new(make_request(), make_comments_page(2));
        api.set_action_result(Ok(make_request()));
        let store = loaded_store(api).await;
        let result = tokio::time::timeout(Duration::from_secs(5), perform(&store, "accept", None))
            .await
            .expect("perform returned");
        assert_eq!(result, Ok(()));
        store.shutdown().await;
    }

    #[tokio::test]
    async fn failed_action_is_returned() {
        let api = MockApi::new(make_request(), make_comments_page(2));
        api.set_action_result(Err(server_error()));
        let store = loaded_store(api).await;
        let result = tokio::time::timeout(Duration::from_secs(5), perform(&store, "decline", None))
            .await
            .expect("perform returned");
        assert_eq!(result, Err(server_error()));
        store.shutdown().await;
    }

    #[tokio::test]
    async fn edit_with_unchanged_revision_completes() {
        let api = MockApi::new(make_request(), make_comments_page(2));
        api.set_update_result(Ok(make_comment("c1", "same")));
        let store = loaded_store(api).await;
        let pending = edit(&store, EventId::from("c1"), "same".to_string(), "html".to_string());
        let result = tokio::time::timeout(Duration::from_secs(5), pending)
            .await
            .expect("edit returned");
        assert_eq!(result, Ok(()));
        store.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn watch_retries_a_failed_fetch() {
        let api = Arc::new(MockApi::new(make_request(), make_comments_page(2)));
        api.set_timeline(vec![Err(server_error()), Ok(make_comments_page(2))]);
        let environment = Environment::new(api.clone(), Config::default());
        let state = State::new(make_request(), &environment.config);
        let store: Store = StoreHandle::spawn(state, environment);
        store.wait_until(|s| s.timeline.error.is_some()).await;

        let watching = tokio::time::timeout(Duration::from_secs(12), watch(&store)).await;
        assert!(watching.is_err(), "watch keeps running after a retryable error");
        let state = store.state();
        assert!(state.timeline.error.is_none());
        assert_eq!(state.timeline.page.as_ref().map(|p| p.hits.len()), Some(2));
        assert!(api.timeline_calls() >= 2);
        store.shutdown().await;
    }

    #[test]
    fn zero_page_size_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{}").unwrap();
        let cli = Cli::try_parse_from([
            "requests-feed",
            "--request-file",
            "request.json",
            "--config",
            path.to_str().unwrap(),
            "--page-size",
            "0",
            "show",
        ])
        .unwrap();
        assert_eq!(load_config(&cli), Err(Error::InvalidQuery("size")));
    }
}
