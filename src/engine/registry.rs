use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use camino::Utf8PathBuf;
use futures::future::{BoxFuture, Shared};

use crate::core::ArcStr;
use crate::error::CompileError;

/// Result of one nested compilation, handed to every stylesheet waiting on it.
#[derive(Debug, Clone)]
pub struct Compiled {
    pub text: ArcStr,
    pub file_dependencies: Vec<Utf8PathBuf>,
    pub context_dependencies: Vec<Utf8PathBuf>,
}

pub(crate) type CompileFuture = Shared<BoxFuture<'static, Result<Compiled, CompileError>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileStatus {
    Pending,
    Done,
    Failed,
}

struct Entry {
    future: CompileFuture,
    /// Output paths this compilation is waiting on.
    waits_on: HashSet<String>,
}

impl Entry {
    fn is_finished(&self) -> bool {
        self.future.peek().is_some()
    }
}

/// Nested compilations of one run, keyed by output filename.
///
/// An entry is created when the first stylesheet asks for an output path and
/// is never replaced, so no output path is compiled twice. The registry also
/// keeps the graph of which unfinished compilation waits on which, and never
/// lets a wait close a cycle in it.
#[derive(Default)]
pub struct CompilationRegistry {
    entries: Mutex<HashMap<String, Entry>>,
}

/// Outcome of [`CompilationRegistry::get_or_schedule`].
pub(crate) struct Scheduled {
    /// `None` when waiting would close a cycle.
    pub future: Option<CompileFuture>,
    /// Whether this call scheduled the compilation.
    pub scheduled: bool,
}

impl CompilationRegistry {
    /// Return the compilation registered for `key`, or register the one built
    /// by `schedule`. The check and the insertion happen under a single lock,
    /// `schedule` runs at most once per key.
    ///
    /// `waiter` is the output path of the compilation asking, if any. It gets
    /// a future to wait on unless `key` already waits on `waiter`, directly or
    /// through other unfinished compilations.
    pub(crate) fn get_or_schedule(
        &self,
        key: &str,
        waiter: Option<&str>,
        schedule: impl FnOnce() -> CompileFuture,
    ) -> Scheduled {
        let mut entries = self.entries.lock().unwrap();

        let scheduled = !entries.contains_key(key);
        if scheduled {
            let entry = Entry {
                future: schedule(),
                waits_on: HashSet::new(),
            };
            entries.insert(key.to_string(), entry);
        }

        let future = entries[key].future.clone();
        let finished = entries[key].is_finished();

        let Some(waiter) = waiter else {
            return Scheduled {
                future: Some(future),
                scheduled,
            };
        };

        if !finished && reaches(&entries, key, waiter) {
            return Scheduled {
                future: None,
                scheduled,
            };
        }

        if let Some(entry) = entries.get_mut(waiter) {
            entry.waits_on.insert(key.to_string());
        }

        Scheduled {
            future: Some(future),
            scheduled,
        }
    }

    pub fn status(&self, key: &str) -> Option<CompileStatus> {
        let entries = self.entries.lock().unwrap();
        let entry = entries.get(key)?;

        Some(match entry.future.peek() {
            None => CompileStatus::Pending,
            Some(Ok(_)) => CompileStatus::Done,
            Some(Err(_)) => CompileStatus::Failed,
        })
    }

    /// Text of a finished compilation.
    pub fn text(&self, key: &str) -> Option<ArcStr> {
        let entries = self.entries.lock().unwrap();
        match entries.get(key)?.future.peek()? {
            Ok(compiled) => Some(compiled.text.clone()),
            Err(_) => None,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Whether `to` can be reached from `from` following waits of unfinished
/// compilations. Every key reaches itself.
fn reaches(entries: &HashMap<String, Entry>, from: &str, to: &str) -> bool {
    let mut stack = vec![from];
    let mut seen = HashSet::new();

    while let Some(key) = stack.pop() {
        if key == to {
            return true;
        }
        if !seen.insert(key) {
            continue;
        }

        if let Some(entry) = entries.get(key).filter(|entry| !entry.is_finished()) {
            stack.extend(entry.waits_on.iter().map(String::as_str));
        }
    }

    false
}

impl std::fmt::Debug for CompilationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompilationRegistry")
            .field("entries", &self.len())
            .finish()
    }
}
