//! Drives a full wizard session against a mock generation service.

use std::sync::Arc;

use storyforge_core::{
    AnalysisReport, AnalysisState, GenerationClient, ProjectData, RequirementStatus,
    WizardSession, WizardStep,
};
use url::Url;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn project() -> ProjectData {
    ProjectData {
        name: "Sistema de Gestión de Inventarios".into(),
        objective: "Controlar el stock en tiempo real".into(),
        audience: "Bodegueros".into(),
        context: "Aplicación web".into(),
    }
}

async fn session_for(server: &MockServer) -> Result<WizardSession, Box<dyn std::error::Error>> {
    let base_url: Url = server.uri().parse()?;
    let client = GenerationClient::new(&base_url)?;
    Ok(WizardSession::new(Arc::new(client)))
}

#[tokio::test]
async fn full_wizard_run_analyzes_only_approved() -> Result<(), Box<dyn std::error::Error>> {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "content": [{ "text": "Como usuario quiero " }, { "text": "lograrlo." }]
        })))
        .expect(3)
        .mount(&server)
        .await;

    let mut session = session_for(&server).await?;
    session.set_project(project());
    session.intake("login con Google\nexportar PDF\n\nnotificaciones\nauditoría \n")?;
    assert_eq!(session.advance()?, WizardStep::Iteration);

    let ids: Vec<_> = session.requirements().iter().map(|r| r.id).collect();
    assert_eq!(ids.len(), 4);

    session.split(ids[1], "exportar reportes", "exportar PDF\nexportar CSV")?;
    let all: Vec<_> = session.requirements().iter().map(|r| r.id).collect();
    assert_eq!(all.len(), 6);
    assert_eq!(
        session.requirements().get(all[5]).map(|r| r.status),
        Some(RequirementStatus::Derived)
    );

    // approve three; the rest stay unapproved
    session.approve(all[0]);
    session.approve(all[3]);
    session.approve(all[4]);
    session.edit(all[2], "notificaciones por correo")?;

    assert_eq!(session.advance()?, WizardStep::Analysis);

    let mut finished = Vec::new();
    let submitted = session
        .analyze_all_with_progress(|event| {
            if let storyforge_core::AnalysisEvent::Finished { id, .. } = event {
                finished.push(*id);
            }
        })
        .await?;

    assert_eq!(submitted, vec![all[0], all[3], all[4]]);
    assert_eq!(finished, submitted);
    for id in &submitted {
        assert_eq!(session.board().state(*id), AnalysisState::Succeeded);
        assert_eq!(
            session.board().result(*id).as_deref(),
            Some("Como usuario quiero lograrlo.")
        );
    }
    assert_eq!(session.board().state(all[2]), AnalysisState::Idle);
    assert!(!session.board().any_loading());

    let report = AnalysisReport::build(session.project(), session.requirements(), session.board());
    assert_eq!(report.analyzed_count(), 3);
    assert_eq!(report.requirements[4].derived_from_ordinal, Some(2));
    Ok(())
}

#[tokio::test]
async fn prompt_carries_project_and_requirement() -> Result<(), Box<dyn std::error::Error>> {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_string_contains("PROYECTO:"))
        .and(body_string_contains("Sistema de Gestión de Inventarios"))
        .and(body_string_contains("REQUERIMIENTO:\\nlogin con Google"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "content": [{ "text": "ok" }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut session = session_for(&server).await?;
    session.set_project(project());
    session.intake("login con Google")?;
    let id = session.requirements().as_slice()[0].id;
    session.approve(id);

    let outcome = session.analyze(id).await?;
    assert_eq!(outcome.text(), "ok");
    Ok(())
}

#[tokio::test]
async fn server_error_is_isolated_per_requirement() -> Result<(), Box<dyn std::error::Error>> {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_string_contains("falla"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "content": [{ "text": "bien" }]
        })))
        .mount(&server)
        .await;

    let mut session = session_for(&server).await?;
    session.set_project(project());
    session.intake("falla\nfunciona")?;
    let ids: Vec<_> = session.requirements().iter().map(|r| r.id).collect();
    for id in &ids {
        session.approve(*id);
    }

    session.analyze_all().await?;

    assert_eq!(session.board().state(ids[0]), AnalysisState::Failed);
    assert_eq!(
        session.board().result(ids[0]).as_deref(),
        Some("Error: Error en la API: Internal Server Error")
    );
    assert_eq!(session.board().state(ids[1]), AnalysisState::Succeeded);
    assert_eq!(session.board().result(ids[1]).as_deref(), Some("bien"));
    Ok(())
}
