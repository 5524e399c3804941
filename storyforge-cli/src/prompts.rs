use anyhow::Result;
use colored::{ColoredString, Colorize};
use inquire::{Confirm, Editor, MultiSelect, Select, Text};

use storyforge_core::{
    AnalysisBoard, AnalysisState, ProjectData, Requirement, RequirementId, RequirementList,
    RequirementStatus,
};

/// Status label colored the way the wizard shows it
pub fn status_badge(status: RequirementStatus) -> ColoredString {
    let label = status.label();
    match status {
        RequirementStatus::Pending => label.dimmed(),
        RequirementStatus::Edited => label.yellow(),
        RequirementStatus::Approved => label.green(),
        RequirementStatus::Derived => label.blue(),
    }
}

/// One-line summary of a requirement, e.g. `#2 Exportar PDF [Aprobado]`
pub fn requirement_line(position: usize, req: &Requirement) -> String {
    format!("#{} {} [{}]", position + 1, req.text, req.status.label())
}

/// Prints the requirement list with derivation hints and analysis state
pub fn print_requirements(list: &RequirementList, board: Option<&AnalysisBoard>) {
    if list.is_empty() {
        println!("{}", "No hay requerimientos cargados.".yellow());
        return;
    }

    let count = list.len();
    println!(
        "{}",
        format!(
            "{} requerimiento{} cargado{}",
            count,
            if count == 1 { "" } else { "s" },
            if count == 1 { "" } else { "s" }
        )
        .bold()
    );

    for (idx, req) in list.iter().enumerate() {
        let analysis = board.map(|b| match b.state(req.id) {
            AnalysisState::Idle => "".normal(),
            AnalysisState::Loading => " Analizando...".cyan(),
            AnalysisState::Succeeded => " ✓ analizado".green(),
            AnalysisState::Failed => " ✗ error".red(),
        });
        println!(
            "  {} {} [{}]{}",
            format!("#{}", idx + 1).dimmed(),
            req.text,
            status_badge(req.status),
            analysis.unwrap_or_else(|| "".normal())
        );
        if let Some(parent) = list.parent_ordinal(req.id) {
            println!("     {}", format!("↳ Derivado de #{}", parent).dimmed());
        }
    }
}

/// Prompts for the project fields, starting from the current values
pub fn prompt_project(current: &ProjectData) -> Result<ProjectData> {
    let name = Text::new("Nombre del Proyecto:")
        .with_initial_value(&current.name)
        .with_placeholder("ej. Sistema de Gestión de Inventarios")
        .prompt()?;
    let objective = Text::new("Objetivo Principal:")
        .with_initial_value(&current.objective)
        .with_placeholder("¿Qué problema resuelve este proyecto?")
        .prompt()?;
    let audience = Text::new("Usuarios / Audiencia:")
        .with_initial_value(&current.audience)
        .with_placeholder("¿Quiénes usarán el sistema?")
        .prompt()?;
    let context = Text::new("Contexto Adicional:")
        .with_initial_value(&current.context)
        .with_placeholder("Tecnologías, restricciones, integraciones...")
        .prompt()?;

    Ok(ProjectData {
        name,
        objective,
        audience,
        context,
    })
}

/// Opens the editor for one or more requirements, one per line
pub fn prompt_requirements_text() -> Result<String> {
    let text = Editor::new("Requerimientos (uno por línea):")
        .with_predefined_text(
            "El sistema debe permitir login con Google\nEl usuario puede exportar reportes en PDF\n",
        )
        .prompt()?;
    Ok(text)
}

fn requirement_options<'a, I>(list: &RequirementList, candidates: I) -> (Vec<RequirementId>, Vec<String>)
where
    I: IntoIterator<Item = &'a Requirement>,
{
    candidates
        .into_iter()
        .map(|req| {
            let position = list.position(req.id).unwrap_or_default();
            (req.id, requirement_line(position, req))
        })
        .unzip()
}

/// Prompts the user to select a requirement from `candidates`
pub fn prompt_select_requirement<'a, I>(
    message: &str,
    list: &RequirementList,
    candidates: I,
) -> Result<Option<RequirementId>>
where
    I: IntoIterator<Item = &'a Requirement>,
{
    let (ids, options) = requirement_options(list, candidates);

    if options.is_empty() {
        return Ok(None);
    }

    let selection = Select::new(message, options).raw_prompt_skippable()?;
    Ok(selection.and_then(|choice| ids.get(choice.index).copied()))
}

/// Prompts for any number of requirements from `candidates`, returned in list order
pub fn prompt_select_requirements<'a, I>(
    message: &str,
    list: &RequirementList,
    candidates: I,
) -> Result<Vec<RequirementId>>
where
    I: IntoIterator<Item = &'a Requirement>,
{
    let (ids, options) = requirement_options(list, candidates);

    if options.is_empty() {
        return Ok(Vec::new());
    }

    let chosen = MultiSelect::new(message, options)
        .with_help_message("Espacio para marcar, Enter para confirmar")
        .raw_prompt()?;
    Ok(chosen
        .iter()
        .filter_map(|choice| ids.get(choice.index).copied())
        .collect())
}

/// Prompts for the new text of a requirement
pub fn prompt_edit_text(current: &str) -> Result<String> {
    let text = Text::new("Texto del requerimiento:")
        .with_initial_value(current)
        .prompt()?;
    Ok(text)
}

/// Prompts for the base text and derived lines of a split
pub fn prompt_split(current: &str) -> Result<(String, String)> {
    let base = Text::new("Requerimiento base (puedes modificarlo):")
        .with_initial_value(current)
        .prompt()?;
    let derived = Editor::new("Nuevos requerimientos derivados (uno por línea):").prompt()?;
    Ok((base, derived))
}

/// Selects one of a fixed set of menu entries, returning its index
pub fn prompt_menu(message: &str, options: &[&str]) -> Result<usize> {
    let choice = Select::new(message, options.to_vec()).raw_prompt()?;
    Ok(choice.index)
}

pub fn prompt_confirm_reset() -> Result<bool> {
    let confirmed = Confirm::new("¿Empezar un proyecto nuevo?")
        .with_help_message("Se perderán los requerimientos y resultados")
        .with_default(false)
        .prompt()?;
    Ok(confirmed)
}

/// Prompts for an export path
pub fn prompt_export_path() -> Result<String> {
    let path = Text::new("Archivo de salida:")
        .with_default("historias.md")
        .with_help_message("Usa extensión .json para exportar en JSON")
        .prompt()?;
    Ok(path)
}
