// UI layer: the sorting loop. Shows one unread bookmark at a time with the
// folder the rules suggest, reads a single keystroke and acts on it.
// Output goes through any `Write` so the loop can be driven from tests.

use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::time::Duration;
use tracing::debug;

use crate::api::{ApiClient, Transport};
use crate::error::Result;
use crate::input::{Command, Key, KeySource};
use crate::model::{Bookmark, BookmarkId, Folder, FolderId};
use crate::rules::{candidate_patterns, RuleStore};

/// Number of folders reachable with a single digit.
pub const MENU_SIZE: usize = 9;

/// Folders offered on keys 1-9, plus every folder for rule lookups.
#[derive(Debug, Clone)]
pub struct FolderMenu {
    folders: Vec<Folder>,
}

impl FolderMenu {
    pub fn new(folders: Vec<Folder>) -> Self {
        Self { folders }
    }

    /// Folder bound to digit `key` (1-based).
    pub fn by_key(&self, key: u8) -> Option<&Folder> {
        let index = usize::from(key).checked_sub(1)?;
        if index >= MENU_SIZE {
            return None;
        }
        self.folders.get(index)
    }

    /// Any fetched folder with this id, including ones past the menu.
    pub fn find(&self, id: FolderId) -> Option<&Folder> {
        self.folders.iter().find(|f| f.id == id)
    }

    /// `(key, folder)` pairs for the menu.
    pub fn entries(&self) -> impl Iterator<Item = (usize, &Folder)> {
        self.folders.iter().take(MENU_SIZE).enumerate().map(|(i, f)| (i + 1, f))
    }
}

/// Totals reported when the loop ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub moved: usize,
    pub skipped: usize,
    pub failed: usize,
    pub rules_written: usize,
}

enum Flow {
    Next,
    Quit,
}

/// Spinner on stderr while a request is in flight.
pub fn spinner(message: impl Into<String>) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message(message.into());
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

/// The interactive sorting session.
pub struct Sorter<'a, T, K, W> {
    api: &'a ApiClient<T>,
    rules: &'a mut RuleStore,
    menu: FolderMenu,
    keys: K,
    out: W,
    batch_size: u32,
    spinners: bool,
    // Shown but left unread; passed as `have` so they are not returned again.
    left_unread: Vec<BookmarkId>,
    summary: Summary,
}

impl<'a, T, K, W> Sorter<'a, T, K, W>
where
    T: Transport,
    K: KeySource,
    W: Write,
{
    pub fn new(api: &'a ApiClient<T>, rules: &'a mut RuleStore, menu: FolderMenu, keys: K, out: W) -> Self {
        Self {
            api,
            rules,
            menu,
            keys,
            out,
            batch_size: crate::config::DEFAULT_BATCH_SIZE,
            spinners: false,
            left_unread: Vec::new(),
            summary: Summary::default(),
        }
    }

    pub fn batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Show spinners during requests (only sensible on a terminal).
    pub fn with_spinners(mut self, enabled: bool) -> Self {
        self.spinners = enabled;
        self
    }

    /// Runs until the queue is empty or the user quits.
    ///
    /// Only fatal errors (rejected credentials) and local I/O failures end
    /// the loop with an error; everything else is reported and skipped.
    pub fn run(mut self) -> Result<Summary> {
        self.print_menu()?;

        'pages: loop {
            let page = match self.fetch_page() {
                Ok(page) => page,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    writeln!(self.out, "Could not fetch unread bookmarks: {e}")?;
                    break;
                }
            };

            // Guard against a service that ignores `have`.
            let fresh: Vec<Bookmark> = page
                .into_iter()
                .filter(|b| !self.left_unread.contains(&b.id))
                .collect();
            if fresh.is_empty() {
                writeln!(self.out, "No unread bookmarks.")?;
                break;
            }

            for bookmark in &fresh {
                if let Flow::Quit = self.handle(bookmark)? {
                    break 'pages;
                }
            }
        }

        let s = self.summary;
        writeln!(
            self.out,
            "Moved {}, skipped {}, failed {}, rules written {}.",
            s.moved, s.skipped, s.failed, s.rules_written
        )?;
        Ok(s)
    }

    fn print_menu(&mut self) -> Result<()> {
        writeln!(self.out, "Folders (1..{MENU_SIZE}):")?;
        for (key, folder) in self.menu.entries() {
            writeln!(self.out, "  {key}: {} (id={})", folder.title, folder.id)?;
        }
        writeln!(
            self.out,
            "\nControls: [1-9]=move  [a]=auto(move by rule)  [s]=save rule for domain  [n]=skip  [q]=quit\n"
        )?;
        Ok(())
    }

    fn fetch_page(&self) -> Result<Vec<Bookmark>> {
        let progress = self.progress("Fetching unread bookmarks...");
        let page = self.api.list_unread_bookmarks(self.batch_size, &self.left_unread);
        progress.finish_and_clear();
        page
    }

    /// Display -> await input -> dispatch, for one bookmark.
    fn handle(&mut self, bookmark: &Bookmark) -> Result<Flow> {
        let domain = bookmark.domain();

        writeln!(self.out, "[{}] {}", bookmark.id, bookmark.display_title())?;
        writeln!(self.out, "  {}", domain.as_deref().unwrap_or(&bookmark.url))?;
        self.print_suggestion(domain.as_deref())?;

        loop {
            let key = self.prompt("> ")?;
            let Some(command) = Command::from_key(key) else {
                writeln!(self.out, "  unknown command (1-9, a, s, n, q)")?;
                continue;
            };

            match command {
                Command::Move(n) => {
                    let Some(folder) = self.menu.by_key(n).cloned() else {
                        writeln!(self.out, "  no folder on key {n}")?;
                        continue;
                    };
                    return self.move_to(bookmark, domain.as_deref(), &folder, true);
                }
                Command::Auto => {
                    let Some(folder) = self.suggestion(domain.as_deref()) else {
                        writeln!(self.out, "  no suggestion")?;
                        continue;
                    };
                    return self.move_to(bookmark, domain.as_deref(), &folder, false);
                }
                Command::Save => {
                    // Records a rule only; the bookmark stays put so the new
                    // suggestion can be applied with `a`.
                    self.save_rule(domain.as_deref())?;
                    self.print_suggestion(domain.as_deref())?;
                }
                Command::Skip => {
                    self.left_unread.push(bookmark.id);
                    self.summary.skipped += 1;
                    writeln!(self.out)?;
                    return Ok(Flow::Next);
                }
                Command::Quit => return Ok(Flow::Quit),
            }
        }
    }

    fn suggestion(&self, domain: Option<&str>) -> Option<Folder> {
        let id = self.rules.suggest(domain?)?;
        let folder = self.menu.find(id).cloned();
        if folder.is_none() {
            debug!("rule for {domain:?} points at unknown folder {id}");
        }
        folder
    }

    fn print_suggestion(&mut self, domain: Option<&str>) -> Result<()> {
        if let Some(folder) = self.suggestion(domain) {
            writeln!(self.out, "  suggestion: {}", folder.title)?;
        }
        Ok(())
    }

    fn move_to(
        &mut self,
        bookmark: &Bookmark,
        domain: Option<&str>,
        folder: &Folder,
        learn: bool,
    ) -> Result<Flow> {
        let progress = self.progress(format!("Moving to {}...", folder.title));
        let result = self.api.move_bookmark(bookmark.id, folder.id);
        progress.finish_and_clear();

        match result {
            Ok(()) => {
                self.summary.moved += 1;
                writeln!(self.out, "  moved -> {}", folder.title)?;
                if let (true, Some(domain)) = (learn, domain) {
                    match self.rules.learn(domain, folder.id) {
                        Ok(true) => self.summary.rules_written += 1,
                        Ok(false) => {}
                        Err(e) => writeln!(self.out, "  could not save rule: {e}")?,
                    }
                }
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                self.left_unread.push(bookmark.id);
                self.summary.failed += 1;
                writeln!(self.out, "  move failed: {e}")?;
            }
        }
        writeln!(self.out)?;
        Ok(Flow::Next)
    }

    /// Asks for a folder key and a pattern, then stores the rule.
    fn save_rule(&mut self, domain: Option<&str>) -> Result<()> {
        let Some(domain) = domain else {
            writeln!(self.out, "  no domain; cannot save rule")?;
            return Ok(());
        };

        writeln!(self.out, "Pick folder key to bind this domain to:")?;
        let entries: Vec<String> = self
            .menu
            .entries()
            .map(|(key, folder)| format!("  {key}: {}", folder.title))
            .collect();
        for line in entries {
            writeln!(self.out, "{line}")?;
        }
        let Some(folder) = self.read_digit("folder key> ")?.and_then(|n| self.menu.by_key(n).cloned()) else {
            writeln!(self.out, "  invalid key")?;
            return Ok(());
        };

        let candidates: Vec<String> = candidate_patterns(domain).into_iter().take(MENU_SIZE).collect();
        writeln!(self.out, "Apply to (Enter = 1):")?;
        for (i, pattern) in candidates.iter().enumerate() {
            let scope = if pattern.starts_with('.') {
                "and all subdomains"
            } else {
                "this host only"
            };
            writeln!(self.out, "  {}: {pattern} ({scope})", i + 1)?;
        }
        let pattern = match self.prompt("pattern key> ")? {
            Key::Enter => candidates.first().cloned(),
            Key::Char(c) => c
                .to_digit(10)
                .and_then(|d| usize::try_from(d).ok())
                .and_then(|d| d.checked_sub(1))
                .and_then(|i| candidates.get(i).cloned()),
            Key::Escape | Key::Interrupt => None,
        };
        let Some(pattern) = pattern else {
            writeln!(self.out, "  invalid key")?;
            return Ok(());
        };

        match self.rules.save(&pattern, folder.id) {
            Ok(saved) => {
                self.summary.rules_written += 1;
                writeln!(self.out, "  saved: {saved} -> {}", folder.title)?;
            }
            Err(e) => writeln!(self.out, "  could not save rule: {e}")?,
        }
        Ok(())
    }

    fn read_digit(&mut self, prompt: &str) -> Result<Option<u8>> {
        Ok(match self.prompt(prompt)? {
            Key::Char(c) => c.to_digit(10).and_then(|d| u8::try_from(d).ok()),
            _ => None,
        })
    }

    /// Prints `prompt`, reads one key and echoes it.
    fn prompt(&mut self, prompt: &str) -> Result<Key> {
        write!(self.out, "{prompt}")?;
        self.out.flush()?;
        let key = self.keys.read_key()?;
        let echo = match key {
            Key::Char(c) => c.to_string(),
            Key::Enter => String::new(),
            Key::Escape => "esc".into(),
            Key::Interrupt => "^C".into(),
        };
        writeln!(self.out, "{echo}")?;
        Ok(key)
    }

    fn progress(&self, message: impl Into<String>) -> ProgressBar {
        if self.spinners {
            spinner(message)
        } else {
            ProgressBar::hidden()
        }
    }
}
