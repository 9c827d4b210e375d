use anyhow::{Context, Result, anyhow, bail};
use arcprobe_core::gp::{GpTask, fetch_gp_task};
use arcprobe_core::helper::{
    ActiveFieldTracker, DistinctValue, LayerEntry, NO_VALUES, OUT_STATISTICS, QueryForm,
    QueryPreset, StatisticType, fetch_distinct_values, fetch_layers, layer_ids_csv,
    queryable_fields,
};
use arcprobe_core::report::{
    ProbeReport, ReportFormat, generate_json_report, generate_json_reports, generate_text_report,
    save_report,
};
use arcprobe_core::settings::{Settings, expand_path};
use arcprobe_core::search::SearchReport;
use arcprobe_core::{PageProbe, SearchTerm, ServiceSearch, StatusIndicator};
use arcprobe_scanner::{HttpTransport, Transport};
use arcprobe_scanner::links::{is_single_layer, service_root, strip_query};
use clap::ArgMatches;
use colored::Colorize;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{Level, debug, info};
use url::Url;

// Helper functions for the probe handler

/// Load URLs from either a file or a single URL argument
pub fn load_urls_from_source(
    url: Option<&Url>,
    pages_file: Option<&PathBuf>,
) -> Result<Vec<String>, String> {
    if let Some(pages_file_path) = pages_file {
        load_urls_from_file(pages_file_path)
    } else if let Some(url) = url {
        Ok(vec![url.as_str().to_string()])
    } else {
        Err("Either --url or --pages-file must be provided".to_string())
    }
}

/// Load and parse URLs from a file. Lines starting with `#` are comments.
pub fn load_urls_from_file(path: &PathBuf) -> Result<Vec<String>, String> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read pages file {}: {}", path.display(), e))?;

    let urls: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(parse_url_line)
        .collect();

    if urls.is_empty() {
        return Err(format!("No valid URLs found in {}", path.display()));
    }

    Ok(urls)
}

/// Parse a single line as a URL, trying to add https:// if needed
pub fn parse_url_line(line: &str) -> Option<String> {
    if let Ok(url) = Url::parse(line)
        && url.has_host()
    {
        return Some(line.to_string());
    }

    let with_scheme = format!("https://{}", line);
    if Url::parse(&with_scheme).is_ok() {
        return Some(with_scheme);
    }

    eprintln!("⚠️  Skipping invalid URL '{}'", line);
    None
}

/// The `--no-*` switches of the probe command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProbeOverrides {
    pub no_metadata: bool,
    pub no_feature_counts: bool,
    pub no_field_counts: bool,
    pub no_domain_counts: bool,
}

impl ProbeOverrides {
    pub fn from_matches(args: &ArgMatches) -> Self {
        Self {
            no_metadata: args.get_flag("no-metadata"),
            no_feature_counts: args.get_flag("no-feature-counts"),
            no_field_counts: args.get_flag("no-field-counts"),
            no_domain_counts: args.get_flag("no-domain-counts"),
        }
    }

    /// Switches only ever turn probes off.
    pub fn apply(&self, mut settings: Settings) -> Settings {
        settings.auto_metadata &= !self.no_metadata;
        settings.auto_feature_counts &= !self.no_feature_counts;
        settings.auto_field_counts &= !self.no_field_counts;
        settings.auto_domain_counts &= !self.no_domain_counts;
        settings
    }
}

/// Split a layer URL into its service URL and layer id.
pub fn split_layer_url(url: &str) -> (String, Option<i64>) {
    let base = strip_query(url).trim_end_matches('/');
    if !is_single_layer(base) {
        return (base.to_string(), None);
    }
    let id = base.rsplit('/').next().and_then(|id| id.parse().ok());
    (service_root(base), id)
}

/// Resolve `@N` tokens against the listed values; anything else is literal.
pub fn resolve_token(token: &str, values: &[DistinctValue]) -> Result<String> {
    match token.strip_prefix('@') {
        Some(index) if !index.is_empty() && index.chars().all(|c| c.is_ascii_digit()) => {
            let index: usize = index.parse()?;
            values
                .get(index)
                .map(|value| value.literal.clone())
                .ok_or_else(|| anyhow!("No value @{} ({} value(s) listed)", index, values.len()))
        }
        _ => Ok(token.to_string()),
    }
}

pub fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// The banner goes to stderr so that JSON on stdout stays parseable.
pub fn print_banner() {
    eprintln!(
        "{} {}",
        "arcprobe".bright_cyan().bold(),
        env!("CARGO_PKG_VERSION").dimmed()
    );
    eprintln!("{}", "ArcGIS REST services directory probe".dimmed());
    eprintln!();
}

fn print_divider() {
    println!("{}", "═".repeat(60).bright_blue().bold());
}

fn load_settings(args: &ArgMatches) -> Result<Settings> {
    let path = args
        .get_one::<String>("settings")
        .map(|path| expand_path(path))
        .context("No settings path")?;
    let settings = Settings::load(&path)?;
    debug!("Settings from {}: {:?}", path.display(), settings);
    Ok(settings)
}

fn transport(args: &ArgMatches) -> Result<HttpTransport> {
    let timeout = *args.get_one::<u64>("timeout").unwrap_or(&30);
    HttpTransport::with_timeout(timeout).context("Failed to build HTTP client")
}

pub fn handle_init(args: &ArgMatches) {
    let path = args
        .get_one::<String>("PATH")
        .map(|path| expand_path(path))
        .unwrap_or_default();
    let force = args.get_flag("force");

    print_divider();
    println!("{}", "  ARCPROBE INITIALIZATION".bright_white().bold());
    print_divider();
    println!();
    println!(
        "{} Target: {}",
        "→".blue(),
        path.display().to_string().bright_white()
    );

    match Settings::default().save(&path, force) {
        Ok(()) => {
            println!(
                "{} Settings written: {}",
                "✓".green().bold(),
                path.display().to_string().bright_white()
            );
            println!();
        }
        Err(e) => {
            eprintln!("{} {}", "✗".red().bold(), e);
            std::process::exit(1);
        }
    }
}

pub async fn handle_probe(sub_matches: &ArgMatches) {
    if let Err(e) = run_probe(sub_matches).await {
        eprintln!("✗ Probe failed: {:#}", e);
        std::process::exit(1);
    }
}

async fn run_probe(sub_matches: &ArgMatches) -> Result<()> {
    let url = sub_matches.get_one::<Url>("url");
    let pages_file = sub_matches.get_one::<PathBuf>("pages-file");
    let quiet = sub_matches.get_flag("quiet");
    let expand = sub_matches.get_flag("expand");
    let format = sub_matches
        .get_one::<String>("format")
        .and_then(|format| ReportFormat::from_str(format))
        .unwrap_or(ReportFormat::Text);
    let output = sub_matches
        .get_one::<String>("output")
        .map(|path| expand_path(path));

    let urls = load_urls_from_source(url, pages_file).map_err(|e| anyhow!(e))?;
    let settings = ProbeOverrides::from_matches(sub_matches).apply(load_settings(sub_matches)?);
    let transport = transport(sub_matches)?;

    if !quiet {
        eprintln!("\n🔎 Probing {} page(s)\n", urls.len());
    }

    let mut reports: Vec<ProbeReport> = Vec::with_capacity(urls.len());
    for page in &urls {
        let indicator = Arc::new(StatusIndicator::new(!quiet));
        let report = PageProbe::new(&transport, settings.clone())
            .with_status(indicator.callback())
            .probe_page(page)
            .await;
        indicator.finish();

        info!(
            "{}: {} panel(s), {} with errors",
            report.page_url,
            report.panels.len(),
            report.error_count()
        );
        reports.push(report);
    }

    let rendered = render_reports(&reports, format, expand)?;
    match output {
        Some(path) => {
            save_report(&rendered, &path)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            if !quiet {
                eprintln!("✓ Report saved to {}", path.display());
            }
        }
        None => print!("{}", rendered),
    }

    if reports.iter().any(ProbeReport::has_stalled_queue) && !quiet {
        eprintln!(
            "{} A probe queue stopped on a failed request; later items were not checked.",
            "⚠".yellow().bold()
        );
    }
    Ok(())
}

/// All reports of a run in one document. JSON output for several pages is
/// an array.
pub fn render_reports(reports: &[ProbeReport], format: ReportFormat, expand: bool) -> Result<String> {
    Ok(match format {
        ReportFormat::Text => reports
            .iter()
            .map(|report| generate_text_report(report, expand))
            .collect::<Vec<_>>()
            .join("\n"),
        ReportFormat::Json if reports.len() == 1 => generate_json_report(&reports[0])?,
        ReportFormat::Json => generate_json_reports(reports)?,
    })
}

pub async fn handle_fields(sub_matches: &ArgMatches) {
    if let Err(e) = run_fields(sub_matches).await {
        eprintln!("✗ {:#}", e);
        std::process::exit(1);
    }
}

async fn run_fields(sub_matches: &ArgMatches) -> Result<()> {
    let url = sub_matches
        .get_one::<Url>("url")
        .context("--url is required")?;
    let transport = transport(sub_matches)?;

    let layers = fetch_layers(&transport, url.as_str()).await?;
    if sub_matches.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&layers)?);
        return Ok(());
    }

    print!("{}", render_layers(&layers));
    Ok(())
}

/// Text listing of layers and their queryable fields.
pub fn render_layers(layers: &[LayerEntry]) -> String {
    let mut out = String::new();
    for layer in layers {
        out.push_str(&format!("{} ({})\n", layer.name.bright_white().bold(), layer.id));
        let fields = queryable_fields(&layer.fields);
        if fields.is_empty() {
            out.push_str(&format!("  {}\n", NO_VALUES.dimmed()));
        }
        for field in fields {
            out.push_str(&format!(
                "  {}  {}  {}\n",
                field.name,
                field.display_name().dimmed(),
                field.field_type.as_str().cyan()
            ));
        }
    }
    out.push_str(&format!("\nLayers: {}\n", layer_ids_csv(layers)));
    out
}

pub async fn handle_values(sub_matches: &ArgMatches) {
    if let Err(e) = run_values(sub_matches).await {
        eprintln!("✗ {:#}", e);
        std::process::exit(1);
    }
}

async fn run_values(sub_matches: &ArgMatches) -> Result<()> {
    let url = sub_matches
        .get_one::<Url>("url")
        .context("--url is required")?;
    let field = sub_matches
        .get_one::<String>("field")
        .context("--field is required")?;
    let (service, url_layer) = split_layer_url(url.as_str());
    let Some(layer) = sub_matches.get_one::<i64>("layer").copied().or(url_layer) else {
        bail!("No layer id: pass --layer or a single layer URL");
    };
    let settings = load_settings(sub_matches)?;
    let transport = transport(sub_matches)?;

    let values = fetch_distinct_values(&transport, &service, layer, field).await?;
    if values.is_empty() {
        println!("{}", NO_VALUES);
    }
    for (i, value) in values.iter().enumerate() {
        println!("  @{:<4} {}", i, value.label);
    }

    let tokens: Vec<&String> = sub_matches
        .get_many::<String>("insert")
        .map(|tokens| tokens.collect())
        .unwrap_or_default();
    let clause = sub_matches.get_one::<String>("where");
    if tokens.is_empty() && clause.is_none() {
        return Ok(());
    }

    let mut tracker = ActiveFieldTracker::new();
    tracker.set(
        clause.cloned().unwrap_or(settings.default_where_clause),
        sub_matches.get_one::<usize>("caret").copied(),
    );
    for token in tokens {
        tracker.insert(&resolve_token(token, &values)?);
    }

    println!();
    println!("{} {}", "where".cyan().bold(), tracker.get());
    Ok(())
}

pub async fn handle_search(sub_matches: &ArgMatches) {
    if let Err(e) = run_search(sub_matches).await {
        eprintln!("✗ Search failed: {:#}", e);
        std::process::exit(1);
    }
}

async fn run_search(sub_matches: &ArgMatches) -> Result<()> {
    let url = sub_matches
        .get_one::<Url>("url")
        .context("--url is required")?;
    let term = sub_matches
        .get_one::<String>("TERM")
        .context("Nothing to search for")?;
    let quiet = sub_matches.get_flag("quiet");
    let term = SearchTerm::parse(term)?;
    let transport = transport(sub_matches)?;

    if !quiet {
        eprintln!("\n🔎 Searching {} for {}\n", url, term);
    }

    let indicator = Arc::new(StatusIndicator::new(!quiet));
    let report = ServiceSearch::new(&transport)
        .with_status(indicator.callback())
        .run(url.as_str(), &term)
        .await;
    indicator.finish();

    if sub_matches.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render_search(&report));
    }

    if report.queue.is_errored() && !quiet {
        eprintln!(
            "{} The search stopped on a failed request; {} location(s) were not searched.",
            "⚠".yellow().bold(),
            report.queue.remaining
        );
    }
    Ok(())
}

/// Text listing of search hits and totals.
pub fn render_search(report: &SearchReport) -> String {
    let mut out = String::new();
    for hit in &report.hits {
        out.push_str(&format!("{} {}\n", "Source:".bold(), hit.source()));
        out.push_str(&format!("  {} {}\n", format!("{}:", hit.field).bold(), hit.value));
    }
    if !report.hits.is_empty() {
        out.push('\n');
    }
    out.push_str(&format!(
        "Searched {} location(s), {} hit(s)\n",
        report.visited,
        report.hits.len()
    ));
    if report.queue.is_errored() {
        out.push_str(&format!("{}\n", report.queue.to_string().red()));
    }
    out
}

/// Parse `TYPE[:FIELD[:OUT_NAME]]`.
pub fn parse_statistic(spec: &str) -> Result<(StatisticType, String, String)> {
    let mut parts = spec.splitn(3, ':');
    let name = parts.next().unwrap_or_default();
    let Some(statistic) = StatisticType::from_name(name) else {
        bail!(
            "Unknown statistic '{}' (one of: {})",
            name,
            StatisticType::ALL.map(|stat| stat.as_str()).join(", ")
        );
    };
    let field = parts.next().unwrap_or_default().to_string();
    let out_name = parts.next().unwrap_or_default().to_string();
    Ok((statistic, field, out_name))
}

/// Parse `NAME=VALUE`.
pub fn parse_assignment(assignment: &str) -> Result<(String, String)> {
    match assignment.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => bail!("Expected NAME=VALUE, got '{}'", assignment),
    }
}

/// Fill a layer query form from the query command's arguments.
pub fn build_query_form(
    preset: Option<QueryPreset>,
    clause: Option<&str>,
    out_fields: Option<&str>,
    statistics: &[String],
    settings: &Settings,
) -> Result<QueryForm> {
    let mut form = QueryForm::new();
    if !settings.default_where_clause.is_empty() {
        form.set("where", settings.default_where_clause.clone());
    }
    if let Some(preset) = preset {
        form.apply(preset);
    }
    if let Some(clause) = clause {
        form.set("where", clause);
    }
    if let Some(out_fields) = out_fields {
        form.set("outFields", out_fields);
    }

    if !statistics.is_empty() {
        let mut tracker = ActiveFieldTracker::new();
        tracker.focus(OUT_STATISTICS, "", None);
        for spec in statistics {
            let (statistic, field, out_name) = parse_statistic(spec)?;
            tracker.add_statistic(statistic, &field, &out_name);
        }
        form.set(OUT_STATISTICS, tracker.get());
    }
    Ok(form)
}

pub async fn handle_query(sub_matches: &ArgMatches) {
    if let Err(e) = run_query(sub_matches).await {
        eprintln!("✗ {:#}", e);
        std::process::exit(1);
    }
}

async fn run_query(sub_matches: &ArgMatches) -> Result<()> {
    let url = sub_matches
        .get_one::<Url>("url")
        .context("--url is required")?;
    let preset = sub_matches
        .get_one::<String>("preset")
        .map(|name| QueryPreset::from_name(name).ok_or_else(|| anyhow!("Unknown preset {}", name)))
        .transpose()?;
    let statistics: Vec<String> = sub_matches
        .get_many::<String>("stat")
        .map(|stats| stats.cloned().collect())
        .unwrap_or_default();
    let settings = load_settings(sub_matches)?;

    let form = build_query_form(
        preset,
        sub_matches.get_one::<String>("where").map(String::as_str),
        sub_matches.get_one::<String>("out-fields").map(String::as_str),
        &statistics,
        &settings,
    )?;
    let query_url = form.url(url.as_str())?;

    if let Some(preset) = preset {
        info!("Preset: {}", preset.title());
    }
    println!("{}", query_url);

    let send = sub_matches.get_flag("send") || preset.is_some_and(|preset| preset.submits());
    if send {
        let transport = transport(sub_matches)?;
        let response = transport
            .get_json(&query_url)
            .await
            .with_context(|| format!("Query failed: {}", query_url))?;
        println!("{}", serde_json::to_string_pretty(&response)?);
    }
    Ok(())
}

/// Text listing of a geoprocessing task's parameters.
pub fn render_gp_task(task: &GpTask) -> String {
    let mut out = format!("{} ({})\n", task.url.bright_white().bold(), task.operation());
    for param in &task.parameters {
        let direction = if param.is_input() { "in" } else { "out" };
        out.push_str(&format!(
            "  {} [{}] {}\n",
            param.name.bold(),
            direction,
            param.data_type.as_deref().unwrap_or_default().cyan()
        ));
        let default = param.default_text();
        if let Some(ref default) = default
            && !default.is_empty()
        {
            out.push_str(&format!("    default: {}\n", default));
        }
        let choices = param.choices();
        if !choices.is_empty() {
            let listed: Vec<String> = choices
                .iter()
                .map(|choice| {
                    if default.as_deref() == Some(choice.as_str()) {
                        format!("{}*", choice)
                    } else {
                        choice.clone()
                    }
                })
                .collect();
            out.push_str(&format!("    choices: {}\n", listed.join(" | ")));
        }
    }
    out
}

pub async fn handle_gp(sub_matches: &ArgMatches) {
    if let Err(e) = run_gp(sub_matches).await {
        eprintln!("✗ {:#}", e);
        std::process::exit(1);
    }
}

async fn run_gp(sub_matches: &ArgMatches) -> Result<()> {
    let url = sub_matches
        .get_one::<Url>("url")
        .context("--url is required")?;
    let entered = sub_matches
        .get_many::<String>("set")
        .map(|values| values.map(|value| parse_assignment(value)).collect::<Result<Vec<_>>>())
        .unwrap_or_else(|| Ok(Vec::new()))?;
    let settings = load_settings(sub_matches)?;
    let transport = transport(sub_matches)?;

    let task = fetch_gp_task(&transport, url.as_str()).await?;
    if sub_matches.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&task)?);
        return Ok(());
    }

    print!("{}", render_gp_task(&task));
    let form = task.form(&entered, &settings.default_web_map_as_json)?;
    println!();
    println!("{} {}", task.operation().cyan().bold(), task.execute_url(&form)?);
    Ok(())
}
