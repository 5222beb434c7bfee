use taskwatch_core::{DownloadForm, Msg};

pub const HELP: &str = "\
Commands:
  login <user> <password> [--remember]   sign in (bare `login` reuses a remembered login)
  logout                                 sign out and stop polling
  refresh                                reload history and active tasks
  precheck <course-url> <bearer>         check a course for DRM
  download <course-url> [--bearer B] [--drm KID:KEY] [--chapters F] [--assets]
  attach <task>                          follow a task's download log
  article <task>                         generate an article for a finished task
  article-log <task>                     follow a task's article log
  detach                                 stop following the current log
  help                                   show this text
  quit                                   exit";

/// One line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Msg(Msg),
    /// Bare `login`: submit whatever the login form was prefilled with.
    LoginPrefilled,
    Help,
    Quit,
}

pub fn parse_command(line: &str) -> Result<Command, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Err("empty command".to_string());
    };
    let args: Vec<&str> = words.collect();

    let command = match verb {
        "login" => return parse_login(&args),
        "logout" => Command::Msg(Msg::LogoutClicked),
        "refresh" => Command::Msg(Msg::RefreshClicked),
        "precheck" => match args.as_slice() {
            [course_url, bearer_token] => Command::Msg(Msg::PrecheckRequested {
                course_url: course_url.to_string(),
                bearer_token: bearer_token.to_string(),
            }),
            _ => return Err("usage: precheck <course-url> <bearer>".to_string()),
        },
        "download" => return parse_download(&args),
        "attach" => Command::Msg(Msg::AttachClicked {
            task_id: single_arg(verb, &args)?,
        }),
        "article" => Command::Msg(Msg::GenerateArticleClicked {
            task_id: single_arg(verb, &args)?,
        }),
        "article-log" => Command::Msg(Msg::ArticleLogClicked {
            task_id: single_arg(verb, &args)?,
        }),
        "detach" => Command::Msg(Msg::DetachClicked),
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => return Err(format!("unknown command {other:?}; type `help`")),
    };
    Ok(command)
}

fn single_arg(verb: &str, args: &[&str]) -> Result<String, String> {
    match args {
        [task_id] => Ok(task_id.to_string()),
        _ => Err(format!("usage: {verb} <task>")),
    }
}

fn parse_login(args: &[&str]) -> Result<Command, String> {
    let remember = args.contains(&"--remember");
    let positional: Vec<&str> = args
        .iter()
        .copied()
        .filter(|arg| *arg != "--remember")
        .collect();
    match positional.as_slice() {
        [] => Ok(Command::LoginPrefilled),
        [username, password] => Ok(Command::Msg(Msg::LoginSubmitted {
            username: username.to_string(),
            password: password.to_string(),
            remember,
        })),
        _ => Err("usage: login <user> <password> [--remember]".to_string()),
    }
}

fn parse_download(args: &[&str]) -> Result<Command, String> {
    let mut form = DownloadForm::default();
    let mut course_url = None;
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match *arg {
            "--bearer" => form.bearer_token = Some(flag_value("--bearer", iter.next())?),
            "--drm" => form.drm_pair = Some(flag_value("--drm", iter.next())?),
            "--chapters" => form.chapter_filter = Some(flag_value("--chapters", iter.next())?),
            "--assets" => form.download_assets = true,
            flag if flag.starts_with("--") => return Err(format!("unknown flag {flag}")),
            url if course_url.is_none() => course_url = Some(url.to_string()),
            extra => return Err(format!("unexpected argument {extra:?}")),
        }
    }
    form.course_url = course_url.unwrap_or_default();
    Ok(Command::Msg(Msg::DownloadRequested(form)))
}

fn flag_value(flag: &str, value: Option<&&str>) -> Result<String, String> {
    value
        .map(|value| value.to_string())
        .ok_or_else(|| format!("{flag} needs a value"))
}
