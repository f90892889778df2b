//! The "which one are you talking about?" dialog.
//!
//! Every search command here has the same problem: a title query comes back
//! with anywhere from zero to a few hundred matches, and exactly one of them
//! should end up in the reply. This module owns that whole interaction: it
//! renders a numbered page of candidates, waits for the requester to answer
//! with an index (or `..` / `...` to flip pages), and hands back the chosen
//! item. Providers and the chat transport are injected, so the same loop
//! serves AniList, MyAnimeList, and the mock pair in the tests below.

use std::{borrow::Cow, num::NonZeroUsize, time::Duration};

use tracing::trace;

pub mod discord;
pub use discord::ChannelDialog;

/// How long one dialog waits for each reply. The window restarts after every
/// qualifying reply, it does not cap the dialog as a whole.
pub const REPLY_TIMEOUT: Duration = Duration::from_secs(30);

/// How many entries a provider should put on one page.
pub const PAGE_SIZE: usize = 15;

/// Anything the dialog can print a line for.
pub trait EntryLabel {
    fn label(&self) -> Cow<'_, str>;
}

impl EntryLabel for String {
    fn label(&self) -> Cow<'_, str> {
        Cow::Borrowed(self)
    }
}

/// One fetched batch of search results plus its pagination metadata.
///
/// Pages are never cached across navigation: flipping back to an earlier page
/// fetches it again, so a dialog always shows what the provider currently
/// returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    entries: Vec<T>,
    total: usize,
    has_next: bool,
}

impl<T> Page<T> {
    pub fn new(entries: Vec<T>, total: usize, has_next: bool) -> Self {
        Self {
            entries,
            total,
            has_next,
        }
    }

    /// Page `index` of an already-complete result list, in windows of
    /// [`PAGE_SIZE`]. Used by providers that return everything up front.
    pub fn slice(items: &[T], index: NonZeroUsize) -> Self
    where
        T: Clone,
    {
        let start = (index.get() - 1) * PAGE_SIZE;
        let end = (start + PAGE_SIZE).min(items.len());

        let entries = if start < items.len() {
            items[start..end].to_vec()
        } else {
            Vec::new()
        };

        Self::new(entries, items.len(), end < items.len())
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn has_next(&self) -> bool {
        self.has_next
    }

    /// Removes the entry at a 1-based position, if there is one.
    fn take(&mut self, position: usize) -> Option<T> {
        (1..=self.entries.len())
            .contains(&position)
            .then(|| self.entries.remove(position - 1))
    }
}

/// A syntactically qualifying reply. Anything that doesn't parse to one of
/// these is not part of the dialog and must be left alone for other handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    /// A 1-based index into the page currently on screen.
    Pick(usize),
    /// `..`
    PreviousPage,
    /// `...`
    NextPage,
}

impl Input {
    pub fn parse(content: &str) -> Option<Self> {
        match content.trim() {
            ".." => Some(Self::PreviousPage),
            "..." => Some(Self::NextPage),
            // "0" can never address an entry, so it doesn't qualify either
            digits => digits
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .map(Self::Pick),
        }
    }

    pub fn matches(content: &str) -> bool {
        Self::parse(content).is_some()
    }
}

/// How one dialog ended. Timeouts and empty result sets are ordinary
/// outcomes, not errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    Selected(T),
    NotFound,
    TimedOut,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SelectError<S, T> {
    #[error("search provider failed: {0}")]
    Source(S),

    #[error("chat transport failed: {0}")]
    Transport(T),
}

/// A lazily-fetchable, possibly multi-page result list.
pub trait PageSource {
    type Item: EntryLabel;
    type Error;

    async fn fetch(&self, page: NonZeroUsize) -> Result<Page<Self::Item>, Self::Error>;
}

/// The slice of a chat transport one dialog needs: a prompt it can put up,
/// edit in place, and take down, plus a bounded wait for the next qualifying
/// reply from the requester.
///
/// Implementations scope `next_reply` to the dialog's author and channel and
/// only surface replies [`Input::parse`] accepts; everything else stays in the
/// channel for other handlers. `close` must be safe to call when no prompt is
/// up.
pub trait Dialog {
    type Error;
    type Reply;

    /// Sends the prompt, or edits it in place if it is already showing.
    async fn render(&mut self, body: &str) -> Result<(), Self::Error>;

    /// Removes the prompt. Runs on every exit path.
    async fn close(&mut self) -> Result<(), Self::Error>;

    /// The next qualifying reply, or `None` once `timeout` elapses.
    async fn next_reply(
        &mut self,
        timeout: Duration,
    ) -> Result<Option<(Input, Self::Reply)>, Self::Error>;

    /// Removes a processed reply from the channel, keeping the transcript
    /// clean.
    async fn consume(&mut self, reply: Self::Reply) -> Result<(), Self::Error>;
}

fn render_body<T: EntryLabel>(page: &Page<T>, index: NonZeroUsize) -> String {
    let mut body = page
        .entries
        .iter()
        .enumerate()
        .map(|(i, entry)| format!("[{}] {}", i + 1, entry.label()))
        .collect::<Vec<_>>()
        .join("\n");

    if index.get() > 1 {
        body.push_str("\n[..] Previous Page");
    }

    if page.has_next() {
        body.push_str("\n[...] Next Page");
    }

    body
}

/// Runs one selection dialog with the default [`REPLY_TIMEOUT`].
pub async fn select<S: PageSource, D: Dialog>(
    source: &S,
    dialog: &mut D,
) -> Result<Outcome<S::Item>, SelectError<S::Error, D::Error>> {
    select_with_timeout(source, dialog, REPLY_TIMEOUT).await
}

/// Runs one selection dialog: fetches page 1, short-circuits the trivial
/// cases, then loops prompt → reply → navigate/select until something
/// terminal happens.
///
/// A numeric reply beyond the current page is ignored without being consumed
/// and the dialog keeps waiting. The bot this replaces indexed straight into
/// the list there, which blew up the command; dropping the reply instead is a
/// deliberate deviation.
pub async fn select_with_timeout<S: PageSource, D: Dialog>(
    source: &S,
    dialog: &mut D,
    timeout: Duration,
) -> Result<Outcome<S::Item>, SelectError<S::Error, D::Error>> {
    let mut index = NonZeroUsize::MIN;
    let mut page = source.fetch(index).await.map_err(SelectError::Source)?;

    if page.total() == 0 {
        return Ok(Outcome::NotFound);
    }

    if page.total() == 1 {
        // a single match is unambiguous, no dialog needed. a provider that
        // claims one result but sends an empty page gets treated as empty
        return Ok(match page.take(1) {
            Some(item) => Outcome::Selected(item),
            None => Outcome::NotFound,
        });
    }

    let rendered = dialog.render(&render_body(&page, index)).await;
    or_close(dialog, rendered)
        .await
        .map_err(SelectError::Transport)?;

    loop {
        let waited = dialog.next_reply(timeout).await;

        let Some((input, reply)) = or_close(dialog, waited)
            .await
            .map_err(SelectError::Transport)?
        else {
            dialog.close().await.map_err(SelectError::Transport)?;
            return Ok(Outcome::TimedOut);
        };

        match input {
            Input::Pick(position) => {
                if let Some(item) = page.take(position) {
                    dialog.close().await.map_err(SelectError::Transport)?;
                    dialog.consume(reply).await.map_err(SelectError::Transport)?;
                    return Ok(Outcome::Selected(item));
                }

                trace!(position, on_page = page.len(), "pick out of range, ignoring");
            }
            Input::PreviousPage => {
                let consumed = dialog.consume(reply).await;
                or_close(dialog, consumed)
                    .await
                    .map_err(SelectError::Transport)?;

                // no-op on page 1: nothing fetched, nothing re-rendered
                if let Some(target) = NonZeroUsize::new(index.get() - 1) {
                    page = fetch_or_close(source, dialog, target).await?;
                    index = target;

                    let rendered = dialog.render(&render_body(&page, index)).await;
                    or_close(dialog, rendered)
                        .await
                        .map_err(SelectError::Transport)?;
                }
            }
            Input::NextPage => {
                let consumed = dialog.consume(reply).await;
                or_close(dialog, consumed)
                    .await
                    .map_err(SelectError::Transport)?;

                if page.has_next() {
                    let target = index.saturating_add(1);
                    page = fetch_or_close(source, dialog, target).await?;
                    index = target;

                    let rendered = dialog.render(&render_body(&page, index)).await;
                    or_close(dialog, rendered)
                        .await
                        .map_err(SelectError::Transport)?;
                }
            }
        }
    }
}

/// Mid-dialog transport failure: take the prompt down best-effort before the
/// error goes up.
async fn or_close<D: Dialog, T>(dialog: &mut D, result: Result<T, D::Error>) -> Result<T, D::Error> {
    if result.is_err() {
        let _ = dialog.close().await;
    }

    result
}

/// Mid-dialog fetch. The prompt comes down before the provider error goes up;
/// a cleanup failure at that point is not worth surfacing over the original
/// error.
async fn fetch_or_close<S: PageSource, D: Dialog>(
    source: &S,
    dialog: &mut D,
    page: NonZeroUsize,
) -> Result<Page<S::Item>, SelectError<S::Error, D::Error>> {
    match source.fetch(page).await {
        Ok(page) => Ok(page),
        Err(err) => {
            let _ = dialog.close().await;
            Err(SelectError::Source(err))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::{collections::VecDeque, sync::Mutex};

    use pretty_assertions::assert_eq;

    #[derive(Debug, thiserror::Error, PartialEq)]
    #[error("mock provider failure")]
    struct MockError;

    /// Serves pages sliced from a fixed list, recording every fetch.
    /// `fail_from` makes fetches for that page index (and later) fail.
    struct MockSource {
        items: Vec<String>,
        fetched: Mutex<Vec<usize>>,
        fail_from: Option<usize>,
    }

    impl MockSource {
        fn of(count: usize) -> Self {
            Self {
                items: (1..=count).map(|n| format!("entry {n}")).collect(),
                fetched: Mutex::new(Vec::new()),
                fail_from: None,
            }
        }

        fn failing_from(mut self, page: usize) -> Self {
            self.fail_from = Some(page);
            self
        }

        fn fetched(&self) -> Vec<usize> {
            self.fetched.lock().unwrap().clone()
        }
    }

    impl PageSource for MockSource {
        type Item = String;
        type Error = MockError;

        async fn fetch(&self, page: NonZeroUsize) -> Result<Page<String>, MockError> {
            self.fetched.lock().unwrap().push(page.get());

            if self.fail_from.is_some_and(|from| page.get() >= from) {
                return Err(MockError);
            }

            Ok(Page::slice(&self.items, page))
        }
    }

    /// Plays back a script of replies, then times out. Records everything the
    /// selector does to the transport.
    struct MockDialog {
        script: Mutex<VecDeque<Input>>,
        rendered: Mutex<Vec<String>>,
        closed: Mutex<usize>,
        consumed: Mutex<usize>,
        fail_render: bool,
    }

    impl MockDialog {
        fn script(inputs: impl IntoIterator<Item = Input>) -> Self {
            Self {
                script: Mutex::new(inputs.into_iter().collect()),
                rendered: Mutex::new(Vec::new()),
                closed: Mutex::new(0),
                consumed: Mutex::new(0),
                fail_render: false,
            }
        }

        fn failing_render() -> Self {
            Self {
                fail_render: true,
                ..Self::silent()
            }
        }

        fn silent() -> Self {
            Self::script([])
        }

        fn rendered(&self) -> Vec<String> {
            self.rendered.lock().unwrap().clone()
        }

        fn closed(&self) -> usize {
            *self.closed.lock().unwrap()
        }

        fn consumed(&self) -> usize {
            *self.consumed.lock().unwrap()
        }
    }

    impl Dialog for &MockDialog {
        type Error = MockError;
        type Reply = ();

        async fn render(&mut self, body: &str) -> Result<(), MockError> {
            if self.fail_render {
                return Err(MockError);
            }

            self.rendered.lock().unwrap().push(body.to_owned());
            Ok(())
        }

        async fn close(&mut self) -> Result<(), MockError> {
            *self.closed.lock().unwrap() += 1;
            Ok(())
        }

        async fn next_reply(
            &mut self,
            _timeout: Duration,
        ) -> Result<Option<(Input, ())>, MockError> {
            Ok(self.script.lock().unwrap().pop_front().map(|input| (input, ())))
        }

        async fn consume(&mut self, _reply: ()) -> Result<(), MockError> {
            *self.consumed.lock().unwrap() += 1;
            Ok(())
        }
    }

    async fn run(
        source: &MockSource,
        dialog: &MockDialog,
    ) -> Result<Outcome<String>, SelectError<MockError, MockError>> {
        let mut dialog = dialog;
        select_with_timeout(source, &mut dialog, Duration::ZERO).await
    }

    #[tokio::test]
    async fn no_results_resolves_without_a_prompt() {
        let source = MockSource::of(0);
        let dialog = MockDialog::silent();

        let outcome = run(&source, &dialog).await.unwrap();

        assert_eq!(outcome, Outcome::NotFound);
        assert_eq!(dialog.rendered(), Vec::<String>::new());
        assert_eq!(dialog.closed(), 0);
    }

    #[tokio::test]
    async fn single_result_skips_the_dialog() {
        let source = MockSource::of(1);
        let dialog = MockDialog::silent();

        let outcome = run(&source, &dialog).await.unwrap();

        assert_eq!(outcome, Outcome::Selected("entry 1".to_owned()));
        assert_eq!(dialog.rendered(), Vec::<String>::new());
    }

    #[tokio::test]
    async fn pick_on_first_page_cleans_up_once() {
        let source = MockSource::of(3);
        let dialog = MockDialog::script([Input::Pick(2)]);

        let outcome = run(&source, &dialog).await.unwrap();

        assert_eq!(outcome, Outcome::Selected("entry 2".to_owned()));
        // one prompt before the reply, one prompt deletion, one reply deletion
        assert_eq!(dialog.rendered().len(), 1);
        assert_eq!(dialog.closed(), 1);
        assert_eq!(dialog.consumed(), 1);
    }

    #[tokio::test]
    async fn first_prompt_lists_entries_with_next_page_marker() {
        let source = MockSource::of(20);
        let dialog = MockDialog::script([Input::Pick(1)]);

        run(&source, &dialog).await.unwrap();

        let prompt = &dialog.rendered()[0];
        assert!(prompt.starts_with("[1] entry 1\n"));
        assert!(prompt.contains("[15] entry 15"));
        assert!(prompt.ends_with("[...] Next Page"));
        assert!(!prompt.contains("Previous Page"));
    }

    #[tokio::test]
    async fn next_page_then_pick_selects_from_that_page() {
        let source = MockSource::of(20);
        let dialog = MockDialog::script([Input::NextPage, Input::Pick(1)]);

        let outcome = run(&source, &dialog).await.unwrap();

        // first item of page 2 is absolute item 16
        assert_eq!(outcome, Outcome::Selected("entry 16".to_owned()));
        assert_eq!(source.fetched(), vec![1, 2]);

        let second_prompt = &dialog.rendered()[1];
        assert!(second_prompt.starts_with("[1] entry 16\n"));
        assert!(second_prompt.ends_with("[..] Previous Page"));
        assert!(!second_prompt.contains("Next Page"));
    }

    #[tokio::test]
    async fn next_page_on_last_page_is_a_noop() {
        let source = MockSource::of(5);
        let dialog = MockDialog::script([Input::NextPage, Input::Pick(5)]);

        let outcome = run(&source, &dialog).await.unwrap();

        assert_eq!(outcome, Outcome::Selected("entry 5".to_owned()));
        // no extra fetch, no re-render; the no-op reply still gets consumed
        assert_eq!(source.fetched(), vec![1]);
        assert_eq!(dialog.rendered().len(), 1);
        assert_eq!(dialog.consumed(), 2);
    }

    #[tokio::test]
    async fn previous_page_on_first_page_is_a_noop() {
        let source = MockSource::of(5);
        let dialog = MockDialog::script([Input::PreviousPage, Input::Pick(1)]);

        let outcome = run(&source, &dialog).await.unwrap();

        assert_eq!(outcome, Outcome::Selected("entry 1".to_owned()));
        assert_eq!(source.fetched(), vec![1]);
        assert_eq!(dialog.rendered().len(), 1);
    }

    #[tokio::test]
    async fn round_trip_forward_and_back_refetches_page_one() {
        let source = MockSource::of(20);
        let dialog = MockDialog::script([Input::NextPage, Input::PreviousPage, Input::Pick(3)]);

        let outcome = run(&source, &dialog).await.unwrap();

        assert_eq!(outcome, Outcome::Selected("entry 3".to_owned()));
        assert_eq!(source.fetched(), vec![1, 2, 1]);
    }

    #[tokio::test]
    async fn timeout_takes_the_prompt_down() {
        let source = MockSource::of(3);
        let dialog = MockDialog::silent();

        let outcome = run(&source, &dialog).await.unwrap();

        assert_eq!(outcome, Outcome::TimedOut);
        assert_eq!(dialog.rendered().len(), 1);
        assert_eq!(dialog.closed(), 1);
    }

    #[tokio::test]
    async fn out_of_range_pick_is_ignored_and_left_alone() {
        let source = MockSource::of(3);
        let dialog = MockDialog::script([Input::Pick(99), Input::Pick(3)]);

        let outcome = run(&source, &dialog).await.unwrap();

        assert_eq!(outcome, Outcome::Selected("entry 3".to_owned()));
        // the out-of-range reply is neither consumed nor answered with a
        // re-render
        assert_eq!(dialog.consumed(), 1);
        assert_eq!(dialog.rendered().len(), 1);
    }

    #[tokio::test]
    async fn provider_error_on_first_fetch_propagates() {
        let source = MockSource::of(3).failing_from(1);
        let dialog = MockDialog::silent();

        let result = run(&source, &dialog).await;

        assert_eq!(result, Err(SelectError::Source(MockError)));
        assert_eq!(dialog.rendered(), Vec::<String>::new());
    }

    #[tokio::test]
    async fn transport_error_still_attempts_cleanup() {
        let source = MockSource::of(3);
        let dialog = MockDialog::failing_render();

        let result = run(&source, &dialog).await;

        assert_eq!(result, Err(SelectError::Transport(MockError)));
        assert_eq!(dialog.closed(), 1);
    }

    #[tokio::test]
    async fn provider_error_mid_dialog_cleans_up_first() {
        let source = MockSource::of(20).failing_from(2);
        let dialog = MockDialog::script([Input::NextPage]);

        let result = run(&source, &dialog).await;

        assert_eq!(result, Err(SelectError::Source(MockError)));
        assert_eq!(dialog.closed(), 1);
    }

    #[tokio::test]
    async fn concurrent_dialogs_do_not_interfere() {
        let source_a = MockSource::of(20);
        let dialog_a = MockDialog::script([Input::NextPage, Input::Pick(2)]);

        let source_b = MockSource::of(3);
        let dialog_b = MockDialog::script([Input::Pick(1)]);

        let (a, b) = tokio::join!(run(&source_a, &dialog_a), run(&source_b, &dialog_b));

        assert_eq!(a.unwrap(), Outcome::Selected("entry 17".to_owned()));
        assert_eq!(b.unwrap(), Outcome::Selected("entry 1".to_owned()));
        assert_eq!(source_a.fetched(), vec![1, 2]);
        assert_eq!(source_b.fetched(), vec![1]);
    }

    mod input {
        use super::*;
        use pretty_assertions::assert_eq;

        #[test]
        fn tokens_parse() {
            assert_eq!(Input::parse(".."), Some(Input::PreviousPage));
            assert_eq!(Input::parse("..."), Some(Input::NextPage));
            assert_eq!(Input::parse("7"), Some(Input::Pick(7)));
            assert_eq!(Input::parse(" 2 "), Some(Input::Pick(2)));
        }

        #[test]
        fn noise_does_not_qualify() {
            assert!(!Input::matches("0"));
            assert!(!Input::matches("-1"));
            assert!(!Input::matches("1.5"));
            assert!(!Input::matches("...."));
            assert!(!Input::matches("next"));
            assert!(!Input::matches(""));
        }
    }

    mod page {
        use super::*;
        use pretty_assertions::assert_eq;

        fn items(count: usize) -> Vec<String> {
            (1..=count).map(|n| n.to_string()).collect()
        }

        #[test]
        fn slice_windows_and_metadata() {
            let all = items(20);

            let first = Page::slice(&all, NonZeroUsize::MIN);
            assert_eq!(first.len(), 15);
            assert_eq!(first.total(), 20);
            assert!(first.has_next());

            let second = Page::slice(&all, NonZeroUsize::new(2).unwrap());
            assert_eq!(second.len(), 5);
            assert!(!second.has_next());
        }

        #[test]
        fn slice_past_the_end_is_empty() {
            let page = Page::slice(&items(3), NonZeroUsize::new(4).unwrap());
            assert!(page.is_empty());
            assert_eq!(page.total(), 3);
        }
    }
}
