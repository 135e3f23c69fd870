use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{debug, info};

use trustflow_k8s::{KubeClient, describe_manifest};
use trustflow_scan::{
    DetailOutcome, DetailRequest, DetailTicket, Inspection, Round, RoundOutcome, ScanConfig,
    Scanner, Severity,
};
use trustflow_tui::{
    Action, Event, EventHandler, Extension, ExtensionRegistry, KeyBindings, KeyContext, PanelView,
    Tui, UiState,
};
use trustflow_types::{
    APPLICATION_KIND, ApplicationDescription, ResourceDescription, WORKLOAD_KINDS,
};

/// Trustflow - signatures, SBOMs and vulnerabilities of the images a workload runs
#[derive(Parser, Debug)]
#[command(name = "trustflow")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Resource kind (Deployment, StatefulSet, DaemonSet, ReplicaSet, Job, CronJob, Pod, Application)
    #[arg(value_name = "KIND", required_unless_present = "file")]
    kind: Option<String>,

    /// Resource name
    #[arg(value_name = "NAME", required_unless_present = "file")]
    name: Option<String>,

    /// Namespace of the resource
    #[arg(short, long, default_value = "default")]
    namespace: String,

    /// Kubernetes context name (defaults to the current context)
    #[arg(long)]
    context: Option<String>,

    /// Argo CD application the resource belongs to, as <namespace>/<name>
    #[arg(long, value_name = "NAMESPACE/NAME")]
    app: Option<String>,

    /// Read the resource from a JSON manifest instead of the cluster
    #[arg(short, long, conflicts_with_all = ["kind", "name"])]
    file: Option<PathBuf>,

    /// Base URL of the verification backend
    #[arg(long)]
    base_url: Option<String>,

    /// Display name of the vulnerability scanner
    #[arg(long)]
    scanner_name: Option<String>,

    /// Config file (defaults to ~/.trustflow/config.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Skip TLS certificate verification
    #[arg(long)]
    insecure: bool,

    /// Print the result as JSON instead of opening the panel
    #[arg(long)]
    json: bool,

    /// With --json, also fetch the findings of this severity
    #[arg(long, value_parser = parse_severity, requires = "json")]
    severity: Option<Severity>,
}

fn parse_severity(s: &str) -> Result<Severity, String> {
    Severity::parse(s).ok_or_else(|| {
        format!("unknown severity '{}' (expected critical, high, medium, low or unknown)", s)
    })
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr so they never mix with the JSON report
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = run(args).await;

    if let Err(e) = &result {
        eprintln!("Error: {:#}", e);
    }

    result
}

/// Results of background work, reported back to the event loop
enum InternalAction {
    RoundSettled(Round, RoundOutcome),
    DetailsSettled(DetailTicket, DetailOutcome),
}

async fn run(args: Args) -> Result<()> {
    let config = scan_config(&args)?;
    let registry = ExtensionRegistry::with_inspection_panel("trustflow");

    let (resource, application) = resolve(&args).await?;
    let Some(extension) = registry.handler_for(&resource.group, &resource.kind) else {
        bail!(
            "No panel registered for {} (group '{}')",
            resource.kind,
            resource.group
        );
    };

    let scanner = Scanner::from_config(config).context("Failed to set up backend client")?;
    let mut inspection = Inspection::new();
    let round = inspection.load(resource, application);

    if args.json {
        print_report(&scanner, &mut inspection, round, args.severity).await
    } else {
        run_panel(&scanner, extension, &mut inspection, round).await
    }
}

/// Defaults, then file and environment, then command line
fn scan_config(args: &Args) -> Result<ScanConfig> {
    let mut config =
        ScanConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    if let Some(base_url) = &args.base_url {
        config.base_url = base_url.clone();
    }
    if let Some(scanner_name) = &args.scanner_name {
        config.scanner_name = scanner_name.clone();
    }
    if args.insecure {
        config.insecure = true;
    }

    debug!(base_url = config.base_url(), scanner = %config.scanner_name, "configuration loaded");
    Ok(config)
}

/// Build the resource and application descriptions the panel is opened with
async fn resolve(args: &Args) -> Result<(ResourceDescription, Option<ApplicationDescription>)> {
    let mut client = None;

    let resource = match &args.file {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("Failed to read manifest {}", path.display()))?;
            describe_manifest(&raw)?
        }
        None => {
            let (Some(kind), Some(name)) = (&args.kind, &args.name) else {
                bail!("KIND and NAME are required unless --file is given");
            };
            let kube = KubeClient::new(args.context.as_deref()).await?;
            let resource = kube
                .describe_resource(&canonical_kind(kind), &args.namespace, name)
                .await?;
            client = Some(kube);
            resource
        }
    };

    let application = if resource.is_application() {
        resource
            .live()
            .map(|live| ApplicationDescription::from_value(&live))
    } else if let Some(app) = &args.app {
        let (namespace, name) = app
            .split_once('/')
            .filter(|(ns, name)| !ns.is_empty() && !name.is_empty())
            .with_context(|| format!("--app must be <namespace>/<name>, got '{}'", app))?;
        let kube = match client {
            Some(kube) => kube,
            None => KubeClient::new(args.context.as_deref()).await?,
        };
        Some(kube.describe_application(namespace, name).await?)
    } else {
        None
    };

    info!(
        kind = %resource.kind,
        name = %resource.name,
        application = application.as_ref().and_then(|a| a.name()).unwrap_or("-"),
        "resource resolved"
    );
    Ok((resource, application))
}

/// Match a user-typed kind against the kinds we know, ignoring case
fn canonical_kind(kind: &str) -> String {
    WORKLOAD_KINDS
        .iter()
        .copied()
        .chain([APPLICATION_KIND])
        .find(|known| known.eq_ignore_ascii_case(kind))
        .unwrap_or(kind)
        .to_string()
}

async fn print_report(
    scanner: &Scanner,
    inspection: &mut Inspection,
    round: Round,
    severity: Option<Severity>,
) -> Result<()> {
    let outcome = scanner.run_round(&round).await;
    inspection.apply(&round, outcome);

    if let Some(request) = severity.and_then(|s| inspection.request_details(s)) {
        let outcome = scanner.fetch_details(&request).await;
        inspection.complete_details(request.ticket, outcome);
    }

    let report = inspection.report(scanner.config());
    let json = serde_json::to_string_pretty(&report).context("Failed to encode report")?;
    println!("{}", json);
    Ok(())
}

async fn run_panel(
    scanner: &Scanner,
    extension: &Extension,
    inspection: &mut Inspection,
    round: Round,
) -> Result<()> {
    let (internal_tx, mut internal_rx) = mpsc::unbounded_channel::<InternalAction>();

    let mut tui = Tui::new()?;
    let mut events = EventHandler::new(Duration::from_millis(250));
    let keybindings = KeyBindings::new();
    let mut ui = UiState::new();

    spawn_round(scanner, round, &internal_tx);
    render(&mut tui, extension, inspection, scanner.config(), &ui)?;

    loop {
        tokio::select! {
            Some(event) = events.next() => {
                match event {
                    Event::Key(key) => {
                        let context = if ui.show_help {
                            KeyContext::Help
                        } else {
                            KeyContext::Panel
                        };
                        if let Some(action) = keybindings.get_action(context, &key) {
                            handle_action(scanner, inspection, &mut ui, &internal_tx, action);
                        }
                    }
                    // Redraw only
                    Event::Tick | Event::Resize(_, _) => {}
                    Event::Error(e) => ui.show_error(e),
                }
            }

            Some(internal) = internal_rx.recv() => {
                match internal {
                    InternalAction::RoundSettled(round, outcome) => {
                        inspection.apply(&round, outcome);
                    }
                    InternalAction::DetailsSettled(ticket, outcome) => {
                        inspection.complete_details(ticket, outcome);
                    }
                }
            }
        }

        if ui.should_quit {
            break;
        }

        render(&mut tui, extension, inspection, scanner.config(), &ui)?;
    }

    events.shutdown().await;
    tui.restore()?;

    Ok(())
}

fn handle_action(
    scanner: &Scanner,
    inspection: &mut Inspection,
    ui: &mut UiState,
    internal_tx: &mpsc::UnboundedSender<InternalAction>,
    action: Action,
) {
    match action {
        Action::Quit => ui.should_quit = true,
        Action::Refresh => {
            let round = inspection.refresh();
            spawn_round(scanner, round, internal_tx);
        }
        Action::ToggleDetails(severity) => {
            ui.detail_scroll = 0;
            if let Some(request) = inspection.request_details(severity) {
                spawn_details(scanner, request, internal_tx);
            }
        }
        Action::ScrollUp(lines) => ui.scroll_up(inspection.details().open, lines),
        Action::ScrollDown(lines) => ui.scroll_down(inspection.details().open, lines),
        Action::ScrollToTop => ui.scroll_to_top(inspection.details().open),
        Action::ToggleHelp => ui.show_help = !ui.show_help,
    }
}

/// Run a round in the background. A superseded round still runs to
/// completion; the inspection drops its results when they arrive.
fn spawn_round(scanner: &Scanner, round: Round, internal_tx: &mpsc::UnboundedSender<InternalAction>) {
    let scanner = scanner.clone();
    let internal_tx = internal_tx.clone();

    tokio::spawn(async move {
        let outcome = scanner.run_round(&round).await;
        let _ = internal_tx.send(InternalAction::RoundSettled(round, outcome));
    });
}

fn spawn_details(
    scanner: &Scanner,
    request: DetailRequest,
    internal_tx: &mpsc::UnboundedSender<InternalAction>,
) {
    let scanner = scanner.clone();
    let internal_tx = internal_tx.clone();

    tokio::spawn(async move {
        let outcome = scanner.fetch_details(&request).await;
        let _ = internal_tx.send(InternalAction::DetailsSettled(request.ticket, outcome));
    });
}

fn render(
    tui: &mut Tui,
    extension: &Extension,
    inspection: &Inspection,
    config: &ScanConfig,
    ui: &UiState,
) -> Result<()> {
    let report = inspection.report(config);
    let view = PanelView {
        title: &extension.title,
        report: &report,
        ui,
    };
    tui.terminal().draw(|frame| extension.render(frame, &view))?;
    Ok(())
}
