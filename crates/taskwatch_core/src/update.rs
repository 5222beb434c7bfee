use crate::{AppState, Effect, LogKind, Msg};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: AppState, msg: Msg) -> (AppState, Vec<Effect>) {
    let effects = match msg {
        Msg::Restore(restored) => {
            state.restore(restored);
            Vec::new()
        }
        Msg::DashboardOpened => state.open_dashboard(),
        Msg::LoginSubmitted {
            username,
            password,
            remember,
        } => state.submit_login(username, password, remember),
        Msg::LogoutClicked => state.logout(),
        Msg::RefreshClicked => {
            let mut effects = Vec::with_capacity(2);
            effects.extend(state.refresh(crate::Feed::History, true));
            effects.extend(state.refresh(crate::Feed::Tasks, true));
            effects
        }
        Msg::PollTick => state.poll_tick(),
        Msg::PrecheckRequested {
            course_url,
            bearer_token,
        } => state.request_precheck(course_url, bearer_token),
        Msg::DownloadRequested(form) => state.request_download(form),
        Msg::AttachClicked { task_id } => state.attach(&task_id, LogKind::Download),
        Msg::ArticleLogClicked { task_id } => state.attach(&task_id, LogKind::Article),
        Msg::GenerateArticleClicked { task_id } => state.request_article(&task_id),
        Msg::DetachClicked => state.detach(),
        Msg::CallCompleted { ticket, result } => state.complete_call(ticket, result),
        Msg::Stream {
            subscription,
            event,
        } => state.stream_event(subscription, event),
        Msg::LogFlushDue { token } => {
            state.flush_log(token);
            Vec::new()
        }
        Msg::NoOp => Vec::new(),
    };

    (state, effects)
}
