use std::sync::Once;

use pretty_assertions::assert_eq;
use taskwatch_core::{
    update, ApiCall, ApiReply, AppState, CallTicket, DownloadAccepted, DownloadForm, Effect,
    HistoryAction, LogKind, LoginRequest, LoginResponse, Msg, PrecheckReport, PrecheckView,
    RememberedLogin, RequestError, RestoredSession, Screen, SectionView, StoreChange, TaskId,
    TaskStatus, TaskSummary,
};

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(watch_logging::initialize_for_tests);
}

fn calls(effects: &[Effect]) -> Vec<(CallTicket, ApiCall, Option<String>)> {
    effects
        .iter()
        .filter_map(|effect| match effect {
            Effect::Call {
                ticket,
                call,
                credential,
            } => Some((*ticket, call.clone(), credential.clone())),
            _ => None,
        })
        .collect()
}

fn ticket_for(effects: &[Effect], label: &str) -> CallTicket {
    calls(effects)
        .into_iter()
        .find(|(_, call, _)| call.label() == label)
        .map(|(ticket, _, _)| ticket)
        .unwrap_or_else(|| panic!("no {label} call in {effects:?}"))
}

fn signed_in() -> (AppState, Vec<Effect>) {
    let (state, _) = update(
        AppState::new(),
        Msg::Restore(RestoredSession {
            credential: Some("tok".to_string()),
            ..RestoredSession::default()
        }),
    );
    update(state, Msg::DashboardOpened)
}

fn history_item(id: &str, status: &str) -> TaskSummary {
    TaskSummary {
        id: TaskId::parse(id).unwrap(),
        course_url: format!("https://courses.example.com/{id}"),
        status: TaskStatus::from(status.to_string()),
        started_at: Some("2024-05-01T08:00:00".to_string()),
        finished_at: None,
        is_drm: Some(false),
        article_status: None,
        message: None,
    }
}

#[test]
fn login_without_fields_shows_inline_error() {
    init_logging();
    let (state, effects) = update(
        AppState::new(),
        Msg::LoginSubmitted {
            username: "  ".to_string(),
            password: "secret".to_string(),
            remember: false,
        },
    );

    assert!(effects.is_empty());
    assert_eq!(
        state.view().login.error.as_deref(),
        Some("Username and password are required")
    );
}

#[test]
fn login_success_stores_token_and_loads_dashboard() {
    init_logging();
    let (state, effects) = update(
        AppState::new(),
        Msg::LoginSubmitted {
            username: " admin ".to_string(),
            password: "secret".to_string(),
            remember: false,
        },
    );
    assert_eq!(
        effects,
        vec![Effect::Call {
            ticket: 1,
            call: ApiCall::Login(LoginRequest {
                username: "admin".to_string(),
                password: "secret".to_string(),
            }),
            credential: None,
        }]
    );
    assert!(state.view().login.submitting);

    let (mut state, effects) = update(
        state,
        Msg::CallCompleted {
            ticket: 1,
            result: Ok(ApiReply::Login(LoginResponse {
                token: "abc".to_string(),
                expires_at: None,
            })),
        },
    );

    assert_eq!(state.screen(), Screen::Dashboard);
    assert_eq!(state.session().credential(), Some("abc"));
    assert_eq!(
        &effects[..3],
        &[
            Effect::Persist(StoreChange::SaveCredential("abc".to_string())),
            Effect::Persist(StoreChange::ForgetLogin),
            Effect::StartPolling,
        ]
    );
    let issued = calls(&effects);
    assert_eq!(issued.len(), 2);
    assert!(issued
        .iter()
        .all(|(_, _, credential)| credential.as_deref() == Some("abc")));
    assert_eq!(state.view().history, SectionView::Loading);
    assert!(state.consume_dirty().screen);
}

#[test]
fn remembered_login_is_persisted_on_request() {
    init_logging();
    let (state, _) = update(
        AppState::new(),
        Msg::LoginSubmitted {
            username: "admin".to_string(),
            password: "secret".to_string(),
            remember: true,
        },
    );
    let (_, effects) = update(
        state,
        Msg::CallCompleted {
            ticket: 1,
            result: Ok(ApiReply::Login(LoginResponse {
                token: "abc".to_string(),
                expires_at: None,
            })),
        },
    );

    assert!(effects.contains(&Effect::Persist(StoreChange::RememberLogin {
        username: "admin".to_string(),
        password: "secret".to_string(),
    })));
}

#[test]
fn login_failure_keeps_login_screen() {
    init_logging();
    let (state, _) = update(
        AppState::new(),
        Msg::LoginSubmitted {
            username: "admin".to_string(),
            password: "wrong".to_string(),
            remember: false,
        },
    );
    let (state, effects) = update(
        state,
        Msg::CallCompleted {
            ticket: 1,
            result: Err(RequestError::new(Some(401), "Invalid credentials")),
        },
    );

    assert!(effects.is_empty());
    assert_eq!(state.screen(), Screen::Login);
    assert!(!state.session().is_authenticated());
    let login = state.view().login;
    assert_eq!(login.error.as_deref(), Some("Invalid credentials"));
    assert!(!login.submitting);
}

#[test]
fn dashboard_without_credential_goes_to_login() {
    init_logging();
    let (state, effects) = update(AppState::new(), Msg::DashboardOpened);

    assert!(effects.is_empty());
    assert_eq!(state.screen(), Screen::Login);
}

#[test]
fn restore_prefills_login_and_bearer() {
    init_logging();
    let (state, effects) = update(
        AppState::with_default_bearer("default-bearer"),
        Msg::Restore(RestoredSession {
            credential: None,
            bearer_override: None,
            remembered_login: Some(RememberedLogin {
                username: "admin".to_string(),
                password: "secret".to_string(),
                expires_at_ms: i64::MAX,
            }),
        }),
    );
    assert!(effects.is_empty());
    let view = state.view();
    assert_eq!(view.login.username, "admin");
    assert_eq!(view.login.password, "secret");
    assert!(view.login.remember);
    assert_eq!(view.form.bearer_token, "default-bearer");

    let (state, _) = update(
        AppState::with_default_bearer("default-bearer"),
        Msg::Restore(RestoredSession {
            bearer_override: Some("remembered".to_string()),
            ..RestoredSession::default()
        }),
    );
    assert_eq!(state.view().form.bearer_token, "remembered");
}

#[test]
fn logout_clears_session_and_ignores_late_responses() {
    init_logging();
    let (state, effects) = signed_in();
    let history_ticket = ticket_for(&effects, "history");
    let (state, _) = update(
        state,
        Msg::AttachClicked {
            task_id: "t1".to_string(),
        },
    );

    let (state, effects) = update(state, Msg::LogoutClicked);
    assert_eq!(
        effects,
        vec![
            Effect::Persist(StoreChange::ClearCredential),
            Effect::CloseStream { subscription: 1 },
            Effect::StopPolling,
        ]
    );
    assert_eq!(state.screen(), Screen::Login);
    assert!(!state.stream().is_open());

    let (state, effects) = update(
        state,
        Msg::CallCompleted {
            ticket: history_ticket,
            result: Ok(ApiReply::History(vec![history_item("t1", "success")])),
        },
    );
    assert!(effects.is_empty());
    assert_eq!(state.view().history, SectionView::NotLoaded);

    let (_, effects) = update(state, Msg::PollTick);
    assert!(effects.is_empty());
}

#[test]
fn download_requires_url_and_bearer() {
    init_logging();
    let (state, _) = signed_in();
    let (state, effects) = update(
        state,
        Msg::DownloadRequested(DownloadForm {
            course_url: "https://courses.example.com/x".to_string(),
            ..DownloadForm::default()
        }),
    );

    assert!(effects.is_empty());
    assert_eq!(
        state.view().form.error.as_deref(),
        Some("Course URL and bearer token are required")
    );
}

#[test]
fn download_failure_surfaces_server_message() {
    init_logging();
    let (state, _) = signed_in();
    let (state, effects) = update(
        state,
        Msg::DownloadRequested(DownloadForm {
            course_url: "https://courses.example.com/x".to_string(),
            bearer_token: Some("bearer".to_string()),
            drm_pair: Some("kid1:key1".to_string()),
            ..DownloadForm::default()
        }),
    );
    let issued = calls(&effects);
    let (ticket, call, _) = &issued[0];
    match call {
        ApiCall::Download(request) => {
            assert_eq!(request.key_entries.len(), 1);
            assert_eq!(request.key_entries[0].kid, "kid1");
        }
        other => panic!("unexpected call {other:?}"),
    }

    let (state, _) = update(
        state,
        Msg::CallCompleted {
            ticket: *ticket,
            result: Err(RequestError::new(Some(422), "course_url required")),
        },
    );
    let form = state.view().form;
    assert_eq!(form.error.as_deref(), Some("course_url required"));
    assert!(!form.submitting);
}

#[test]
fn download_success_remembers_bearer_and_attaches() {
    init_logging();
    let (state, _) = signed_in();
    let (state, effects) = update(
        state,
        Msg::DownloadRequested(DownloadForm {
            course_url: "https://courses.example.com/x".to_string(),
            bearer_token: Some("bearer".to_string()),
            ..DownloadForm::default()
        }),
    );
    let ticket = ticket_for(&effects, "download");

    let (state, effects) = update(
        state,
        Msg::CallCompleted {
            ticket,
            result: Ok(ApiReply::Download(DownloadAccepted {
                task_id: TaskId::parse("job42").unwrap(),
                status: Some("queued".to_string()),
            })),
        },
    );

    assert_eq!(
        effects[0],
        Effect::Persist(StoreChange::SaveBearerOverride("bearer".to_string()))
    );
    assert!(effects.contains(&Effect::OpenStream {
        subscription: 1,
        task_id: TaskId::parse("job42").unwrap(),
        kind: LogKind::Download,
        credential: "tok".to_string(),
    }));
    assert!(calls(&effects)
        .iter()
        .any(|(_, call, _)| *call == ApiCall::History));
    assert_eq!(state.session().bearer_override(), Some("bearer"));
    assert_eq!(
        state.session().observed().map(|observed| observed.task_id.as_str()),
        Some("job42")
    );
    assert_eq!(state.view().log.title.as_deref(), Some("Watching task job42"));
}

#[test]
fn precheck_reports_drm_counts() {
    init_logging();
    let (state, _) = signed_in();
    let (state, effects) = update(
        state,
        Msg::PrecheckRequested {
            course_url: "https://courses.example.com/x".to_string(),
            bearer_token: "bearer".to_string(),
        },
    );
    assert_eq!(state.view().form.precheck, PrecheckView::Checking);
    let ticket = ticket_for(&effects, "precheck");

    let (state, _) = update(
        state,
        Msg::CallCompleted {
            ticket,
            result: Ok(ApiReply::Precheck(PrecheckReport {
                is_drm: true,
                total_lectures: 40,
                encrypted_lectures: 12,
            })),
        },
    );
    assert_eq!(
        state.view().form.precheck,
        PrecheckView::Drm {
            encrypted: 12,
            total: 40
        }
    );
}

#[test]
fn generate_article_marks_row_until_server_answers() {
    init_logging();
    let (state, effects) = signed_in();
    let history_ticket = ticket_for(&effects, "history");
    let (state, _) = update(
        state,
        Msg::CallCompleted {
            ticket: history_ticket,
            result: Ok(ApiReply::History(vec![history_item("t1", "success")])),
        },
    );
    let actions = |state: &AppState| match state.view().history {
        SectionView::Loaded(rows) => rows[0].actions.clone(),
        other => panic!("history not loaded: {other:?}"),
    };
    assert_eq!(
        actions(&state),
        vec![HistoryAction::GenerateArticle, HistoryAction::ViewArticleLog]
    );

    let (state, effects) = update(
        state,
        Msg::GenerateArticleClicked {
            task_id: "t1".to_string(),
        },
    );
    let ticket = ticket_for(&effects, "generate-article");
    assert_eq!(
        actions(&state),
        vec![HistoryAction::Generating, HistoryAction::ViewArticleLog]
    );

    let (state, effects) = update(
        state,
        Msg::GenerateArticleClicked {
            task_id: "t1".to_string(),
        },
    );
    assert!(effects.is_empty());

    let (state, _) = update(
        state,
        Msg::CallCompleted {
            ticket,
            result: Err(RequestError::new(Some(400), "Only success tasks can generate article")),
        },
    );
    assert_eq!(
        actions(&state),
        vec![HistoryAction::GenerateArticle, HistoryAction::ViewArticleLog]
    );
    assert_eq!(
        state.view().history_notice.as_deref(),
        Some("Only success tasks can generate article")
    );
}

#[test]
fn generate_article_success_refetches_history_during_poll() {
    init_logging();
    let (state, effects) = signed_in();
    let history_ticket = ticket_for(&effects, "history");
    let (state, _) = update(
        state,
        Msg::CallCompleted {
            ticket: history_ticket,
            result: Ok(ApiReply::History(vec![history_item("t1", "success")])),
        },
    );
    let (state, effects) = update(
        state,
        Msg::GenerateArticleClicked {
            task_id: "t1".to_string(),
        },
    );
    let article_ticket = ticket_for(&effects, "generate-article");

    // A background history request is still in flight when the server answers.
    let (state, tick_effects) = update(state, Msg::PollTick);
    let polled_ticket = ticket_for(&tick_effects, "history");

    let (state, effects) = update(
        state,
        Msg::CallCompleted {
            ticket: article_ticket,
            result: Ok(ApiReply::ArticleQueued),
        },
    );
    let refetch_ticket = ticket_for(&effects, "history");
    assert_ne!(refetch_ticket, polled_ticket);

    let generating = history_item("t1", "生成文章中");
    let (state, _) = update(
        state,
        Msg::CallCompleted {
            ticket: refetch_ticket,
            result: Ok(ApiReply::History(vec![generating])),
        },
    );
    let actions = match state.view().history {
        SectionView::Loaded(rows) => rows[0].actions.clone(),
        other => panic!("history not loaded: {other:?}"),
    };
    assert_eq!(
        actions,
        vec![HistoryAction::Generating, HistoryAction::ViewArticleLog]
    );

    // The older poll response lands afterwards and is discarded.
    let (state, _) = update(
        state,
        Msg::CallCompleted {
            ticket: polled_ticket,
            result: Ok(ApiReply::History(vec![history_item("t1", "success")])),
        },
    );
    let actions = match state.view().history {
        SectionView::Loaded(rows) => rows[0].actions.clone(),
        other => panic!("history not loaded: {other:?}"),
    };
    assert_eq!(
        actions,
        vec![HistoryAction::Generating, HistoryAction::ViewArticleLog]
    );
}
