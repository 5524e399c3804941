mod cli;
mod prompts;

use anyhow::{bail, Context, Result};
use clap::Parser;
use colored::Colorize;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::runtime::Runtime;
use tracing::{debug, info, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use storyforge_core::config::{API_URL_ENV, TIMEOUT_ENV};
use storyforge_core::export::{export_json, export_markdown};
use storyforge_core::{
    get_config_path, AnalysisEvent, AnalysisReport, Config, GenerationClient, ProjectData,
    RequirementList, StoreError, WizardError, WizardSession, WizardStep,
};

use crate::cli::{Cli, Command, ReportFormat};

/// What the wizard loop does after a screen returns
enum Flow {
    Continue,
    Quit,
}

fn main() -> Result<()> {
    let mut cli = Cli::parse();
    setup_logging(cli.verbose);

    let config = load_config(&cli)?;

    match cli.command.take().unwrap_or(Command::Wizard) {
        Command::Wizard => {
            let runtime = build_runtime()?;
            let mut session = new_session(&config)?;
            run_wizard(&mut session, &runtime)?;
        }
        Command::Run {
            name,
            objective,
            audience,
            context,
            requirements,
            approve_all,
            approve,
            output,
            format,
            concurrency,
        } => {
            let runtime = build_runtime()?;
            let mut session = new_session(&config)?;
            session.set_project(ProjectData {
                name,
                objective,
                audience,
                context,
            });
            let raw = read_requirements(&requirements)?;
            session.intake(&raw)?;
            approve_requirements(&mut session, approve_all, &approve)?;
            run_batch(
                &mut session,
                &runtime,
                usize::from(concurrency),
                output.as_deref(),
                format,
            )?;
        }
        Command::Config { save } => {
            let path = cli.config.clone().or_else(get_config_path);
            show_config(path.as_deref(), &config);
            if save {
                save_config(path.as_deref(), &config)?;
            }
        }
    }

    Ok(())
}

fn setup_logging(verbosity: u8) {
    let level = match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

/// Defaults, then the config file, then environment, then flags
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load_file(path)?.apply_vars(|key| std::env::var(key).ok())?,
        None => Config::load()?,
    };

    if let Some(url) = &cli.api_url {
        config = config.with_api_url(url)?;
    }

    debug!(?config, "Effective configuration");
    Ok(config)
}

fn build_runtime() -> Result<Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")
}

fn new_session(config: &Config) -> Result<WizardSession> {
    let client = GenerationClient::from_config(config).with_context(|| {
        format!(
            "Cannot reach the generation service. Set {} or pass --api-url",
            API_URL_ENV
        )
    })?;
    info!(endpoint = %client.endpoint(), "Using generation service");
    Ok(WizardSession::new(Arc::new(client)))
}

fn read_requirements(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut raw = String::new();
        std::io::stdin()
            .read_to_string(&mut raw)
            .context("Failed to read requirements from stdin")?;
        return Ok(raw);
    }

    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read requirements from {}", path.display()))
}

fn approve_requirements(
    session: &mut WizardSession,
    approve_all: bool,
    positions: &[usize],
) -> Result<()> {
    let ids: Vec<_> = session.requirements().iter().map(|r| r.id).collect();

    if approve_all {
        for id in ids {
            session.approve(id);
        }
        return Ok(());
    }

    for &position in positions {
        match position.checked_sub(1).and_then(|idx| ids.get(idx)) {
            Some(id) => session.approve(*id),
            None => bail!(
                "No requirement at position {} (there are {})",
                position,
                ids.len()
            ),
        }
    }

    Ok(())
}

/// Prints one progress line per analysis event
fn print_progress(list: &RequirementList, event: &AnalysisEvent) {
    match event {
        AnalysisEvent::Started { index, total, id } => {
            let ordinal = list.position(*id).map(|p| p + 1).unwrap_or_default();
            eprintln!(
                "{} Analizando #{}...",
                format!("[{}/{}]", index + 1, total).dimmed(),
                ordinal
            );
        }
        AnalysisEvent::Finished {
            index,
            total,
            success,
            ..
        } => {
            let mark = if *success { "✓".green() } else { "✗".red() };
            eprintln!("{} {}", format!("[{}/{}]", index + 1, total).dimmed(), mark);
        }
    }
}

fn run_batch(
    session: &mut WizardSession,
    runtime: &Runtime,
    concurrency: usize,
    output: Option<&Path>,
    format: ReportFormat,
) -> Result<()> {
    session.advance()?;
    session.advance()?;

    let submitted = if concurrency > 1 {
        eprintln!(
            "{}",
            format!("Analizando con {} solicitudes en paralelo...", concurrency).dimmed()
        );
        runtime.block_on(session.analyze_concurrent(concurrency))?
    } else {
        let list = session.requirements().clone();
        runtime.block_on(session.analyze_all_with_progress(|event| print_progress(&list, event)))?
    };
    info!(count = submitted.len(), "Analysis finished");

    let report = AnalysisReport::build(session.project(), session.requirements(), session.board());

    match output {
        Some(path) => {
            match format {
                ReportFormat::Markdown => export_markdown(&report, path)?,
                ReportFormat::Json => export_json(&report, path)?,
            }
            eprintln!(
                "{} {}",
                "Reporte guardado en".green(),
                path.display().to_string().cyan()
            );
        }
        None => match format {
            ReportFormat::Markdown => print!("{}", report.to_markdown()),
            ReportFormat::Json => println!("{}", report.to_json()?),
        },
    }

    Ok(())
}

fn show_config(path: Option<&Path>, config: &Config) {
    let path = path
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "(none)".to_string());
    let api_url = config
        .api_url
        .as_ref()
        .map(|u| u.to_string())
        .unwrap_or_else(|| "(not set)".to_string());
    let timeout = config
        .timeout_secs
        .map(|s| format!("{}s", s))
        .unwrap_or_else(|| "(default)".to_string());

    println!("{}: {}", "Config file".blue(), path);
    println!("{}: {}", "API URL".blue(), api_url);
    println!("{}: {}", "Timeout".blue(), timeout);
    println!(
        "{}",
        format!("Environment overrides: {}, {}", API_URL_ENV, TIMEOUT_ENV).dimmed()
    );
}

fn save_config(path: Option<&Path>, config: &Config) -> Result<()> {
    let Some(path) = path else {
        bail!("No config location available. Pass --config <path>");
    };
    config
        .save(path)
        .with_context(|| format!("Failed to save config to {}", path.display()))?;
    println!(
        "{} {}",
        "Configuración guardada en".green(),
        path.display().to_string().cyan()
    );
    Ok(())
}

fn run_wizard(session: &mut WizardSession, runtime: &Runtime) -> Result<()> {
    println!("{}", "StoryForge".bold().cyan());
    println!(
        "{}",
        "De requerimientos a historias de usuario, paso a paso.".dimmed()
    );

    loop {
        print_step_header(session.step());
        let flow = match session.step() {
            WizardStep::Project => project_step(session)?,
            WizardStep::Iteration => iteration_step(session)?,
            WizardStep::Analysis => analysis_step(session, runtime)?,
        };
        if let Flow::Quit = flow {
            break;
        }
    }

    Ok(())
}

fn print_step_header(current: WizardStep) {
    let steps: Vec<String> = WizardStep::ALL
        .iter()
        .map(|step| {
            let label = step.to_string();
            if *step == current {
                label.bold().cyan().to_string()
            } else if *step < current {
                label.green().to_string()
            } else {
                label.dimmed().to_string()
            }
        })
        .collect();
    println!("\n{}", steps.join("  →  "));
    println!("{}", "-".repeat(60));
}

fn warn_user(err: &WizardError) {
    println!("{} {}", "!".yellow().bold(), err.to_string().yellow());
}

fn project_step(session: &mut WizardSession) -> Result<Flow> {
    if !session.project().is_complete() {
        let project = prompts::prompt_project(session.project())?;
        session.set_project(project);
    }

    loop {
        prompts::print_requirements(session.requirements(), None);

        let choice = prompts::prompt_menu(
            "¿Qué deseas hacer?",
            &[
                "Agregar requerimientos",
                "Eliminar un requerimiento",
                "Editar datos del proyecto",
                "Iterar requerimientos →",
                "Salir",
            ],
        )?;

        match choice {
            0 => {
                let raw = prompts::prompt_requirements_text()?;
                match session.intake(&raw) {
                    Ok(()) => println!("{}", "Requerimientos agregados.".green()),
                    Err(WizardError::Store(StoreError::NothingToAdd)) => {
                        println!("{}", "No se encontró texto para agregar.".yellow())
                    }
                    Err(e) => warn_user(&e),
                }
            }
            1 => {
                let list = session.requirements();
                if let Some(id) =
                    prompts::prompt_select_requirement("Eliminar:", list, list.iter())?
                {
                    session.remove(id);
                    println!("{}", "Requerimiento eliminado.".green());
                }
            }
            2 => {
                let project = prompts::prompt_project(session.project())?;
                session.set_project(project);
            }
            3 => match session.advance() {
                Ok(_) => return Ok(Flow::Continue),
                Err(e) => warn_user(&e),
            },
            _ => return Ok(Flow::Quit),
        }
    }
}

fn iteration_step(session: &mut WizardSession) -> Result<Flow> {
    loop {
        prompts::print_requirements(session.requirements(), None);

        let choice = prompts::prompt_menu(
            "¿Qué deseas hacer?",
            &[
                "Revisar un requerimiento",
                "Generar análisis →",
                "← Atrás",
                "Salir",
            ],
        )?;

        match choice {
            0 => review_requirement(session)?,
            1 => match session.advance() {
                Ok(_) => return Ok(Flow::Continue),
                Err(e) => warn_user(&e),
            },
            2 => {
                session.back();
                return Ok(Flow::Continue);
            }
            _ => return Ok(Flow::Quit),
        }
    }
}

fn review_requirement(session: &mut WizardSession) -> Result<()> {
    let list = session.requirements();
    let Some(id) = prompts::prompt_select_requirement("Requerimiento:", list, list.iter())? else {
        return Ok(());
    };
    let Some(current) = session.requirements().get(id).map(|r| r.text.clone()) else {
        return Ok(());
    };

    let action = prompts::prompt_menu(
        "Acción:",
        &["Aprobar", "Editar", "Separar", "Eliminar", "Cancelar"],
    )?;

    let result = match action {
        0 => {
            session.approve(id);
            Ok(())
        }
        1 => {
            let text = prompts::prompt_edit_text(&current)?;
            session.edit(id, &text)
        }
        2 => {
            let (base, derived) = prompts::prompt_split(&current)?;
            session.split(id, &base, &derived)
        }
        3 => {
            session.remove(id);
            Ok(())
        }
        _ => Ok(()),
    };

    if let Err(e) = result {
        warn_user(&e);
    }
    Ok(())
}

fn analysis_step(session: &mut WizardSession, runtime: &Runtime) -> Result<Flow> {
    loop {
        prompts::print_requirements(session.requirements(), Some(session.board()));

        let choice = prompts::prompt_menu(
            "¿Qué deseas hacer?",
            &[
                "Analizar todos los aprobados",
                "Analizar seleccionados",
                "Analizar un requerimiento",
                "Ver resultados",
                "Exportar reporte",
                "Nuevo proyecto",
                "← Atrás",
                "Salir",
            ],
        )?;

        match choice {
            0 => {
                let list = session.requirements().clone();
                let run = session.analyze_all_with_progress(|e| print_progress(&list, e));
                if let Err(e) = runtime.block_on(run) {
                    warn_user(&e);
                }
            }
            1 => {
                let list = session.requirements().clone();
                let ids = prompts::prompt_select_requirements(
                    "Analizar seleccionados:",
                    &list,
                    list.approved(),
                )?;
                if ids.is_empty() {
                    println!("{}", "No se seleccionó ningún requerimiento.".yellow());
                } else {
                    let run = session.analyze_selected(&ids, |e| print_progress(&list, e));
                    if let Err(e) = runtime.block_on(run) {
                        warn_user(&e);
                    }
                }
            }
            2 => {
                let list = session.requirements();
                if let Some(id) =
                    prompts::prompt_select_requirement("Analizar:", list, list.approved())?
                {
                    match runtime.block_on(session.analyze(id)) {
                        Ok(outcome) => print_outcome(&outcome),
                        Err(e) => warn_user(&e),
                    }
                } else {
                    println!("{}", "No hay requerimientos aprobados.".yellow());
                }
            }
            3 => print_results(session),
            4 => export_report(session)?,
            5 => {
                if prompts::prompt_confirm_reset()? {
                    session.reset();
                    return Ok(Flow::Continue);
                }
            }
            6 => {
                session.back();
                return Ok(Flow::Continue);
            }
            _ => return Ok(Flow::Quit),
        }
    }
}

fn print_outcome(outcome: &storyforge_core::AnalysisOutcome) {
    if outcome.is_success() {
        println!("\n{}\n", outcome.text());
    } else {
        println!("\n{}\n", outcome.text().red());
    }
}

fn print_results(session: &WizardSession) {
    let board = session.board();
    if board.result_count() == 0 {
        println!("{}", "Todavía no hay resultados.".yellow());
        return;
    }

    for (idx, req) in session.requirements().iter().enumerate() {
        let Some(outcome) = board.outcome(req.id) else {
            continue;
        };
        println!("\n{} {}", format!("#{}", idx + 1).bold(), req.text.bold());
        print_outcome(&outcome);
    }
}

fn export_report(session: &WizardSession) -> Result<()> {
    let path = PathBuf::from(prompts::prompt_export_path()?);
    let report = AnalysisReport::build(session.project(), session.requirements(), session.board());

    let is_json = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if is_json {
        export_json(&report, &path)?;
    } else {
        export_markdown(&report, &path)?;
    }

    println!(
        "{} {}",
        "Reporte guardado en".green(),
        path.display().to_string().cyan()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_with(raw: &str) -> WizardSession {
        let url = "http://localhost:9".parse().unwrap();
        let client = GenerationClient::new(&url).unwrap();
        let mut session = WizardSession::new(Arc::new(client));
        session.intake(raw).unwrap();
        session
    }

    fn approved_texts(session: &WizardSession) -> Vec<String> {
        session
            .requirements()
            .approved()
            .map(|r| r.text.clone())
            .collect()
    }

    #[test]
    fn approve_by_position() {
        let mut session = session_with("a\nb\nc");
        approve_requirements(&mut session, false, &[1, 3]).unwrap();
        assert_eq!(approved_texts(&session), vec!["a", "c"]);
    }

    #[test]
    fn approve_all_ignores_positions() {
        let mut session = session_with("a\nb");
        approve_requirements(&mut session, true, &[]).unwrap();
        assert_eq!(approved_texts(&session), vec!["a", "b"]);
    }

    #[test]
    fn approve_rejects_out_of_range_positions() {
        let mut session = session_with("a\nb");
        assert!(approve_requirements(&mut session, false, &[0]).is_err());
        assert!(approve_requirements(&mut session, false, &[3]).is_err());
    }

    #[test]
    fn save_config_needs_a_path() {
        assert!(save_config(None, &Config::default()).is_err());
    }
}
