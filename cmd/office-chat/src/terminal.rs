//! Line-based client. One conversation is open at a time; new messages,
//! notifications and the unread title are printed as snapshots arrive.

use std::collections::HashSet;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Local};
use domains::{find_user, Message, MessageId, User, ROSTER};
use services::{attachments, auth, conversation, ChatService};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::watch;

type Input = Lines<BufReader<Stdin>>;

const HELP: &str = "\
commands:
  /users            list colleagues and unread counts
  /open <id>        open the conversation with a colleague
  /file <path>      send a file
  /audio <path>     send a voice clip
  /reply <n>        send quick reply number n
  /later            answer the last notification with a busy signal
  /help             this text
  /quit             leave
anything else is sent as text to the open conversation";

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

pub async fn run(chat: ChatService) -> anyhow::Result<()> {
    let mut input = BufReader::new(tokio::io::stdin()).lines();
    let Some(me) = login(&mut input).await? else {
        return Ok(());
    };

    let (tx, mut rx) = watch::channel(Vec::new());
    let _subscription = chat
        .subscribe(Arc::new(move |snapshot| {
            let _ = tx.send(snapshot);
        }))
        .await?;

    println!("connected via {} backend\n{HELP}", chat.backend());
    let mut session = Session::new(&chat, me);

    loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = rx.borrow_and_update().clone();
                session.on_snapshot(snapshot).await;
            }
            line = input.next_line() => {
                let Some(line) = line? else { break };
                if session.on_line(line.trim()).await == Flow::Quit {
                    break;
                }
            }
        }
    }

    tracing::info!(user = %me.id, "session closed");
    Ok(())
}

async fn login(input: &mut Input) -> anyhow::Result<Option<&'static User>> {
    println!("colleagues:");
    for user in ROSTER.iter() {
        println!("  {:>2}  {} ({})", user.id, user.name, user.role.as_deref().unwrap_or("-"));
    }

    loop {
        let Some(id) = prompt(input, "user id: ").await? else {
            return Ok(None);
        };
        let Some(pin) = prompt(input, "PIN: ").await? else {
            return Ok(None);
        };
        match auth::login(id.trim(), pin.trim()) {
            Ok(user) => {
                println!("welcome, {}", user.name);
                return Ok(Some(user));
            }
            Err(e) => println!("{e}"),
        }
    }
}

async fn prompt(input: &mut Input, label: &str) -> std::io::Result<Option<String>> {
    print!("{label}");
    std::io::stdout().flush()?;
    input.next_line().await
}

struct Session<'a> {
    chat: &'a ChatService,
    me: &'static User,
    partner: Option<&'static User>,
    snapshot: Vec<Message>,
    loaded: bool,
    seen: HashSet<MessageId>,
    unread: usize,
    suggestions: Vec<String>,
    /// Message the current quick replies answer.
    suggested_for: Option<MessageId>,
    notified: Option<Message>,
}

impl<'a> Session<'a> {
    fn new(chat: &'a ChatService, me: &'static User) -> Self {
        Self {
            chat,
            me,
            partner: None,
            snapshot: Vec::new(),
            loaded: false,
            seen: HashSet::new(),
            unread: 0,
            suggestions: Vec::new(),
            suggested_for: None,
            notified: None,
        }
    }

    async fn on_snapshot(&mut self, snapshot: Vec<Message>) {
        for message in &snapshot {
            if !self.seen.insert(message.id.clone()) || !self.loaded {
                continue;
            }
            if self.in_open_thread(message) {
                println!("{}", render(message, self.me));
            }
        }
        self.loaded = true;
        self.snapshot = snapshot;

        let unread = conversation::unread_count(&self.snapshot, &self.me.id);
        if unread != self.unread {
            self.unread = unread;
            println!("== {} ==", conversation::window_title(unread));
        }

        if let Some(partner) = self.partner {
            self.chat.open_thread(&self.snapshot, self.me, partner).await;
            self.refresh_suggestions().await;
        }

        self.notify();
    }

    fn notify(&mut self) {
        let Some(incoming) = self.chat.pending_notification(&self.snapshot, self.me) else {
            return;
        };
        if self.partner.is_some_and(|p| incoming.is_from(&p.id)) {
            return;
        }
        if self.notified.as_ref().is_some_and(|n| n.id == incoming.id) {
            return;
        }
        println!(
            "!! {}: {}  (/open {} to read, /later to answer busy)",
            incoming.sender_name,
            incoming.preview(),
            incoming.sender_id
        );
        self.notified = Some(incoming.clone());
    }

    async fn on_line(&mut self, line: &str) -> Flow {
        if line.is_empty() {
            return Flow::Continue;
        }
        let (command, arg) = match line.split_once(' ') {
            Some((c, a)) => (c, a.trim()),
            None => (line, ""),
        };

        match command {
            "/quit" => return Flow::Quit,
            "/help" => println!("{HELP}"),
            "/users" => self.list_users(),
            "/open" => self.open(arg).await,
            "/file" => self.send_attachment(arg, false).await,
            "/audio" => self.send_attachment(arg, true).await,
            "/reply" => self.reply(arg).await,
            "/later" => self.later().await,
            _ if command.starts_with('/') => println!("unknown command, try /help"),
            _ => self.send_text(line).await,
        }
        Flow::Continue
    }

    fn list_users(&self) {
        for user in ROSTER.iter().filter(|u| u.id != self.me.id) {
            let unread =
                conversation::unread_in_thread(&self.snapshot, &self.me.id, &user.id).len();
            let marker = if unread > 0 { format!("  [{unread}]") } else { String::new() };
            println!("  {:>2}  {}{marker}", user.id, user.name);
        }
    }

    async fn open(&mut self, id: &str) {
        let Some(partner) = find_user(id).filter(|u| u.id != self.me.id) else {
            println!("no colleague with id {id:?}");
            return;
        };
        self.partner = Some(partner);
        self.suggestions.clear();
        self.suggested_for = None;
        if self.notified.as_ref().is_some_and(|n| n.is_from(&partner.id)) {
            self.notified = None;
        }

        println!("-- {} --", partner.name);
        for message in conversation::thread(&self.snapshot, &self.me.id, &partner.id) {
            println!("{}", render(message, self.me));
        }
        self.chat.open_thread(&self.snapshot, self.me, partner).await;
        self.refresh_suggestions().await;
    }

    async fn refresh_suggestions(&mut self) {
        let Some(partner) = self.partner else { return };
        let last = conversation::last_inbound_text(&self.snapshot, &self.me.id, &partner.id)
            .map(|m| m.id.clone());
        if last == self.suggested_for {
            return;
        }
        self.suggested_for = last;
        self.suggestions = self.chat.suggest_replies(&self.snapshot, self.me, partner).await;
        for (n, reply) in self.suggestions.iter().enumerate() {
            println!("  /reply {}  {reply}", n + 1);
        }
    }

    async fn send_text(&mut self, text: &str) {
        let Some(partner) = self.partner else {
            println!("open a conversation first (/open <id>)");
            return;
        };
        match self.chat.send_text(self.me, partner, text).await {
            Ok(()) => self.suggestions.clear(),
            Err(notice) => println!("{notice}"),
        }
    }

    async fn reply(&mut self, arg: &str) {
        let chosen = arg
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| self.suggestions.get(i))
            .cloned();
        match chosen {
            Some(text) => self.send_text(&text).await,
            None => println!("no quick reply {arg:?}"),
        }
    }

    async fn send_attachment(&mut self, path: &str, as_audio: bool) {
        let Some(partner) = self.partner else {
            println!("open a conversation first (/open <id>)");
            return;
        };
        if path.is_empty() {
            println!("usage: {} <path>", if as_audio { "/audio" } else { "/file" });
            return;
        }
        let attachment = match attachments::load(Path::new(path)).await {
            Ok(a) => a,
            Err(notice) => {
                println!("{notice}");
                return;
            }
        };
        let sent = if as_audio {
            self.chat.send_audio(self.me, partner, attachment).await
        } else {
            self.chat.send_file(self.me, partner, attachment).await
        };
        if let Err(notice) = sent {
            println!("{notice}");
        }
    }

    async fn later(&mut self) {
        let Some(incoming) = self.notified.take() else {
            println!("nothing to postpone");
            return;
        };
        match self.chat.dismiss_notification(self.me, &incoming).await {
            Ok(()) => println!("told {} you are busy", incoming.sender_name),
            Err(notice) => println!("{notice}"),
        }
    }

    fn in_open_thread(&self, message: &Message) -> bool {
        self.partner.is_some_and(|p| {
            (message.is_from(&p.id) && message.is_to(&self.me.id))
                || (message.is_from(&self.me.id) && message.is_to(&p.id))
        })
    }
}

fn render(message: &Message, me: &User) -> String {
    let at = DateTime::from_timestamp_millis(message.timestamp)
        .map(|t| t.with_timezone(&Local).format("%H:%M").to_string())
        .unwrap_or_default();
    let who = if message.is_from(&me.id) {
        "you"
    } else {
        message.sender_name.as_str()
    };
    format!("[{at}] {who}: {}", message.preview())
}

#[cfg(test)]
mod tests {
    use super::*;
    use domains::Recipient;

    #[test]
    fn renders_own_messages_as_you() {
        let franco = find_user("1").unwrap();
        let giovanni = find_user("2").unwrap();

        let mine = Message::text(franco, Recipient::user(&giovanni.id), "ciao");
        let theirs = Message::text(giovanni, Recipient::user(&franco.id), "salve");

        assert!(render(&mine, franco).ends_with("you: ciao"));
        assert!(render(&theirs, franco).ends_with("Giovanni C.: salve"));
    }
}
