use chrono::{DateTime, Local, NaiveDateTime};
use taskwatch_core::{
    ActiveTaskAction, ActiveTaskRowView, AppViewModel, HistoryAction, HistoryRowView, LogView,
    PrecheckView, Screen, SectionView, SubscriptionId,
};

/// Turns view models into terminal lines, printing only dirty sections.
///
/// The log panel is append-only on a terminal, so the renderer remembers how
/// many of the panel's lines it already printed and emits only the new tail.
#[derive(Debug, Default)]
pub struct TerminalRenderer {
    log_panel: Option<(Option<String>, Option<SubscriptionId>)>,
    printed_log: u64,
}

impl TerminalRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render(&mut self, view: &AppViewModel) -> Vec<String> {
        let dirty = view.dirty;
        let mut out = Vec::new();

        if view.screen == Screen::Login {
            if dirty.screen || dirty.login {
                render_login(view, &mut out);
            }
            return out;
        }

        if dirty.screen {
            out.push("== Dashboard ==".to_string());
        }
        if dirty.form {
            render_form(view, &mut out);
        }
        if dirty.active_tasks || dirty.screen {
            render_active(&view.active_tasks, &mut out);
        }
        if dirty.history || dirty.screen {
            render_history(&view.history, view.history_notice.as_deref(), &mut out);
        }
        if dirty.log {
            self.render_log(&view.log, &mut out);
        }
        out
    }

    fn render_log(&mut self, log: &LogView, out: &mut Vec<String>) {
        let panel = (log.title.clone(), log.subscription);
        if self.log_panel.as_ref() != Some(&panel) {
            self.log_panel = Some(panel);
            self.printed_log = 0;
            match &log.title {
                Some(title) => out.push(format!("-- {title} --")),
                None => out.push("-- log closed --".to_string()),
            }
        }
        for line in fresh_tail(self.printed_log, log.appended, &log.lines) {
            out.push(format!("  | {line}"));
        }
        self.printed_log = log.appended;
        if let Some(notice) = &log.notice {
            out.push(format!("  ({notice})"));
        }
    }
}

/// Lines of `lines` not yet shown, given how many lines had been appended when
/// the panel was last printed and how many have been appended now.
///
/// `lines` holds the newest `lines.len()` of the `appended` lines. A count that
/// went backwards means the panel was cleared, so everything is new.
pub fn fresh_tail(printed: u64, appended: u64, lines: &[String]) -> &[String] {
    let fresh = match appended.checked_sub(printed) {
        Some(fresh) => usize::try_from(fresh).unwrap_or(usize::MAX),
        None => lines.len(),
    };
    &lines[lines.len() - fresh.min(lines.len())..]
}

fn render_login(view: &AppViewModel, out: &mut Vec<String>) {
    let login = &view.login;
    out.push("== Login ==".to_string());
    if login.submitting {
        out.push("Signing in...".to_string());
    } else if !login.username.is_empty() {
        out.push(format!(
            "Remembered login for {}; type `login` to use it.",
            login.username
        ));
    } else {
        out.push("Type `login <user> <password> [--remember]`.".to_string());
    }
    if let Some(error) = &login.error {
        out.push(format!("Login failed: {error}"));
    }
}

fn render_form(view: &AppViewModel, out: &mut Vec<String>) {
    let form = &view.form;
    match &form.precheck {
        PrecheckView::Idle => {}
        PrecheckView::Checking => out.push("Precheck: checking...".to_string()),
        PrecheckView::Drm { encrypted, total } => out.push(format!(
            "Precheck: DRM protected ({encrypted} of {total} lectures encrypted); pass --drm KID:KEY"
        )),
        PrecheckView::Clear { total } => {
            out.push(format!("Precheck: no DRM ({total} lectures)"))
        }
        PrecheckView::Failed(message) => out.push(format!("Precheck failed: {message}")),
    }
    if form.submitting {
        out.push("Submitting download...".to_string());
    }
    if let Some(status) = &form.status {
        out.push(status.clone());
    }
    if let Some(error) = &form.error {
        out.push(format!("Download failed: {error}"));
    }
}

fn render_active(section: &SectionView<ActiveTaskRowView>, out: &mut Vec<String>) {
    out.push("Active tasks:".to_string());
    match section {
        SectionView::NotLoaded | SectionView::Loading => out.push("  loading...".to_string()),
        SectionView::Failed(message) => out.push(format!("  failed: {message}")),
        SectionView::Loaded(rows) if rows.is_empty() => out.push("  none".to_string()),
        SectionView::Loaded(rows) => {
            for row in rows {
                let action = match row.action {
                    ActiveTaskAction::ViewLog => format!("attach {}", row.task_id),
                    ActiveTaskAction::Waiting => "waiting".to_string(),
                };
                out.push(format!(
                    "  [{}] {:<10} {}  ({})",
                    row.short_id, row.status, row.course_url, action
                ));
            }
        }
    }
}

fn render_history(
    section: &SectionView<HistoryRowView>,
    notice: Option<&str>,
    out: &mut Vec<String>,
) {
    out.push("History:".to_string());
    if let Some(notice) = notice {
        out.push(format!("  {notice}"));
    }
    match section {
        SectionView::NotLoaded | SectionView::Loading => out.push("  loading...".to_string()),
        SectionView::Failed(message) => out.push(format!("  failed: {message}")),
        SectionView::Loaded(rows) if rows.is_empty() => out.push("  no jobs yet".to_string()),
        SectionView::Loaded(rows) => {
            for row in rows {
                let started = row
                    .started_at
                    .as_deref()
                    .map(format_timestamp)
                    .unwrap_or_else(|| "-".to_string());
                let drm = match row.is_drm {
                    Some(true) => " DRM",
                    _ => "",
                };
                let actions = row
                    .actions
                    .iter()
                    .map(|action| history_action_label(*action, row))
                    .collect::<Vec<_>>()
                    .join(", ");
                out.push(format!(
                    "  [{}] {} {:<10}{} {}  {}",
                    row.short_id, started, row.status, drm, row.course_url, actions
                ));
            }
        }
    }
}

fn history_action_label(action: HistoryAction, row: &HistoryRowView) -> String {
    match action {
        HistoryAction::GenerateArticle => format!("article {}", row.task_id),
        HistoryAction::RetryArticle => format!("retry: article {}", row.task_id),
        HistoryAction::Generating => "generating...".to_string(),
        HistoryAction::ViewArticleLog => format!("article-log {}", row.task_id),
    }
}

/// `MM-DD HH:MM:SS` in local time; unparsable input is shown as-is.
pub fn format_timestamp(raw: &str) -> String {
    const FORMAT: &str = "%m-%d %H:%M:%S";
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return parsed.with_timezone(&Local).format(FORMAT).to_string();
    }
    match NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        Ok(naive) => naive.format(FORMAT).to_string(),
        Err(_) => raw.to_string(),
    }
}
