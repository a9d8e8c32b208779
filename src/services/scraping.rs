use crate::domain::{
    BatchReport, OperatorRecord, OverviewResult, PageKind, PlayerIdentity, PlayerSnapshot, Role,
    RosterSnapshot, ScrapeTask, SlotKey, TaskError,
};
use crate::infrastructure::{extract_operators, OverviewExtractor, PageNavigator, PagePlan, StatLocator};
use futures::FutureExt;
use std::any::Any;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// What one task produced. Failures are already folded in: a failed overview
/// is an error record, a failed operators page is an empty list.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutput {
    Overview(OverviewResult),
    Operators(Vec<OperatorRecord>),
}

impl TaskOutput {
    fn failed(page: PageKind, message: &str) -> Self {
        match page {
            PageKind::Overview => TaskOutput::Overview(TaskError::internal(message).into()),
            PageKind::Operators => TaskOutput::Operators(Vec::new()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaskResult {
    pub key: SlotKey,
    pub page: PageKind,
    pub output: TaskOutput,
}

#[derive(Clone)]
struct Worker {
    navigator: Arc<dyn PageNavigator>,
    locator: Arc<StatLocator>,
    wait_timeout: Duration,
}

impl Worker {
    async fn execute(self, task: ScrapeTask) -> TaskResult {
        let key = task.key();
        let page = task.page;
        info!(
            role = %key.role,
            slot = key.slot,
            %page,
            username = task.identity.username(),
            "task started"
        );

        let output = match AssertUnwindSafe(self.run_task(&task)).catch_unwind().await {
            Ok(output) => output,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(role = %key.role, slot = key.slot, %page, "task panicked: {}", message);
                TaskOutput::failed(page, &format!("extraction panicked: {message}"))
            }
        };

        match &output {
            TaskOutput::Overview(result) => match result.error_kind() {
                Some(kind) => warn!(role = %key.role, slot = key.slot, %page, ?kind, "task degraded"),
                None => info!(role = %key.role, slot = key.slot, %page, "task ok"),
            },
            TaskOutput::Operators(ops) => {
                info!(role = %key.role, slot = key.slot, %page, operators = ops.len(), "task ok")
            }
        }

        TaskResult { key, page, output }
    }

    async fn run_task(&self, task: &ScrapeTask) -> TaskOutput {
        let url = task.identity.profile_url(task.page);
        let plan = PagePlan::for_page(task.page, self.wait_timeout);
        let document = self.navigator.open(&url, &plan).await;

        match task.page {
            PageKind::Overview => TaskOutput::Overview(match document {
                Ok(doc) => OverviewExtractor::new(&self.locator).extract(&doc),
                Err(e) => {
                    warn!("Overview navigation failed for {}: {}", url, e);
                    OverviewResult::from(TaskError::from(e))
                }
            }),
            PageKind::Operators => TaskOutput::Operators(match document {
                Ok(doc) => extract_operators(&doc),
                Err(e) => {
                    warn!("Operators navigation failed for {}: {}", url, e);
                    Vec::new()
                }
            }),
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Fans a roster out into page tasks over a bounded pool and folds the
/// results back into one snapshot per player.
pub struct BatchScraper {
    worker: Worker,
    max_workers: usize,
}

impl BatchScraper {
    pub fn new(
        navigator: Arc<dyn PageNavigator>,
        locator: Arc<StatLocator>,
        max_workers: usize,
        wait_timeout: Duration,
    ) -> Self {
        info!("Created batch scraper with {} workers", max_workers);
        Self {
            worker: Worker {
                navigator,
                locator,
                wait_timeout,
            },
            max_workers: max_workers.max(1),
        }
    }

    pub async fn run(&self, roster: RosterSnapshot) -> BatchReport {
        self.run_with_progress(roster, |_| {}).await
    }

    /// Runs every task of the roster and returns once all of them finished.
    /// `on_task` sees each result as it completes.
    pub async fn run_with_progress<F>(&self, roster: RosterSnapshot, mut on_task: F) -> BatchReport
    where
        F: FnMut(&TaskResult) + Send,
    {
        let tasks = roster.tasks();
        info!(
            "Starting batch: {} players, {} tasks, {} workers",
            roster.player_count(),
            tasks.len(),
            self.max_workers
        );

        let permits = Arc::new(Semaphore::new(self.max_workers));
        let results = self.execute_all(tasks, permits, &mut on_task).await;
        let report = assemble(&roster, results);

        info!(
            "Batch completed: {} players, {} overview errors",
            report.len(),
            report.error_count()
        );
        report
    }

    pub async fn run_player(
        &self,
        identity: PlayerIdentity,
        key: SlotKey,
        permits: Arc<Semaphore>,
    ) -> PlayerSnapshot {
        let tasks = [PageKind::Overview, PageKind::Operators]
            .into_iter()
            .map(|page| ScrapeTask {
                identity: identity.clone(),
                role: key.role,
                slot: key.slot,
                page,
            })
            .collect();

        let mut results = self.execute_all(tasks, permits, &mut |_| {}).await;
        snapshot_for(&identity, key, &mut results)
    }

    pub async fn run_page(
        &self,
        identity: PlayerIdentity,
        page: PageKind,
        permits: Arc<Semaphore>,
    ) -> TaskOutput {
        let task = ScrapeTask {
            identity,
            role: Role::Main,
            slot: 0,
            page,
        };
        self.execute_all(vec![task], permits, &mut |_| {})
            .await
            .pop()
            .map(|result| result.output)
            .unwrap_or_else(|| TaskOutput::failed(page, "task did not complete"))
    }

    async fn execute_all<F>(
        &self,
        tasks: Vec<ScrapeTask>,
        permits: Arc<Semaphore>,
        on_task: &mut F,
    ) -> Vec<TaskResult>
    where
        F: FnMut(&TaskResult),
    {
        let mut set = JoinSet::new();
        for task in tasks {
            let worker = self.worker.clone();
            let permits = Arc::clone(&permits);
            set.spawn(async move {
                let _permit = match permits.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return TaskResult {
                            key: task.key(),
                            page: task.page,
                            output: TaskOutput::failed(task.page, "worker pool closed"),
                        }
                    }
                };
                worker.execute(task).await
            });
        }

        let mut results = Vec::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(result) => {
                    on_task(&result);
                    results.push(result);
                }
                // The key is recovered during reassembly from the roster.
                Err(e) => error!("Scrape task failed to join: {}", e),
            }
        }
        results
    }
}

fn assemble(roster: &RosterSnapshot, results: Vec<TaskResult>) -> BatchReport {
    let mut by_key: BTreeMap<SlotKey, Vec<TaskResult>> = BTreeMap::new();
    for result in results {
        by_key.entry(result.key).or_default().push(result);
    }

    let players = roster
        .players()
        .into_iter()
        .map(|(key, identity)| {
            let mut results = by_key.remove(&key).unwrap_or_default();
            (key, snapshot_for(identity, key, &mut results))
        })
        .collect();

    BatchReport::new(players)
}

fn snapshot_for(
    identity: &PlayerIdentity,
    key: SlotKey,
    results: &mut Vec<TaskResult>,
) -> PlayerSnapshot {
    let mut overview = None;
    let mut operators = None;
    for result in results.drain(..) {
        match result.output {
            TaskOutput::Overview(result) => overview = Some(result),
            TaskOutput::Operators(ops) => operators = Some(ops),
        }
    }

    let overview = overview
        .unwrap_or_else(|| TaskError::internal("overview task did not complete").into());
    PlayerSnapshot::new(identity, key, overview, operators.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ErrorKind, Platform, Roster, SENTINEL};
    use crate::domain::ProfileUrl;
    use crate::error::NavigationError;
    use crate::infrastructure::RenderedDocument;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const OVERVIEW: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/fixtures/overview.html"));
    const NO_SEASON: &str =
        include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/fixtures/overview_no_season.html"));
    const OPERATORS: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/fixtures/operators.html"));
    const NOT_FOUND: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/fixtures/not_found.html"));

    #[derive(Clone)]
    enum Script {
        Page(&'static str),
        Timeout,
        Blocked,
        Panic,
    }

    struct ScriptedNavigator {
        scripts: HashMap<String, Script>,
        delay: Duration,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        opened: AtomicUsize,
    }

    impl ScriptedNavigator {
        fn new(delay: Duration) -> Self {
            Self {
                scripts: HashMap::new(),
                delay,
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
                opened: AtomicUsize::new(0),
            }
        }

        fn script(mut self, identity: &PlayerIdentity, page: PageKind, script: Script) -> Self {
            self.scripts
                .insert(identity.profile_url(page).to_string(), script);
            self
        }
    }

    #[async_trait]
    impl PageNavigator for ScriptedNavigator {
        async fn open(
            &self,
            url: &ProfileUrl,
            _plan: &PagePlan,
        ) -> Result<RenderedDocument, NavigationError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            self.opened.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            match self.scripts.get(url.as_str()).cloned() {
                Some(Script::Page(html)) => Ok(RenderedDocument::from_html(url.as_str(), html)),
                Some(Script::Timeout) => Err(NavigationError::Timeout(30)),
                Some(Script::Blocked) => Err(NavigationError::Blocked),
                Some(Script::Panic) => panic!("scripted panic for {url}"),
                None => Ok(RenderedDocument::from_html(url.as_str(), NOT_FOUND)),
            }
        }
    }

    fn player(name: &str) -> PlayerIdentity {
        PlayerIdentity::new(name, Platform::Psn).unwrap()
    }

    fn batch_scraper(
        navigator: ScriptedNavigator,
        workers: usize,
    ) -> (BatchScraper, Arc<ScriptedNavigator>) {
        let navigator = Arc::new(navigator);
        let scraper = BatchScraper::new(
            navigator.clone(),
            Arc::new(StatLocator::default()),
            workers,
            Duration::from_secs(1),
        );
        (scraper, navigator)
    }

    fn full_roster() -> Roster {
        Roster::new(
            Some(player("Alice")),
            vec![player("Bob"), player("Carol")],
            vec![player("Dave")],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn returns_one_entry_per_player() {
        let roster = full_roster();
        let (scraper, navigator) = batch_scraper(ScriptedNavigator::new(Duration::ZERO), 3);

        let report = scraper.run(roster.clone()).await;

        assert_eq!(report.len(), roster.player_count());
        for (key, identity) in roster.players() {
            let snapshot = report.get(key).expect("every player present");
            assert_eq!(snapshot.username, identity.username());
            assert_eq!(snapshot.key(), key);
        }
        assert_eq!(navigator.opened.load(Ordering::SeqCst), 8);
    }

    #[tokio::test]
    async fn alice_without_season_and_operators_timeout() {
        let alice = player("Alice");
        let navigator = ScriptedNavigator::new(Duration::ZERO)
            .script(&alice, PageKind::Overview, Script::Page(NO_SEASON))
            .script(&alice, PageKind::Operators, Script::Timeout);
        let (scraper, _) = batch_scraper(navigator, 2);
        let roster = Roster::new(Some(alice), vec![], vec![]).unwrap();

        let report = scraper.run(roster).await;
        let json = serde_json::to_value(&report).unwrap();
        let main = &json["main"];

        assert_eq!(main["overview"]["Rank Points"], "4200 RP");
        assert_eq!(main["overview"]["Season K/D"], SENTINEL);
        assert_eq!(main["overview"]["Season Win Rate"], SENTINEL);
        assert_eq!(main["overview"]["Season Matches"], SENTINEL);
        assert_eq!(main["Top Operators"], serde_json::json!([]));
        assert_eq!(main["tracker_url"], "https://r6.tracker.network/r6siege/profile/psn/Alice/overview?lang=en");
    }

    #[tokio::test]
    async fn one_timeout_does_not_touch_siblings() {
        let roster = full_roster();
        let script_all = |navigator: ScriptedNavigator| {
            roster.players().into_iter().fold(navigator, |nav, (_, identity)| {
                nav.script(identity, PageKind::Overview, Script::Page(OVERVIEW))
                    .script(identity, PageKind::Operators, Script::Page(OPERATORS))
            })
        };

        let (clean, _) = batch_scraper(script_all(ScriptedNavigator::new(Duration::ZERO)), 4);
        let baseline = clean.run(roster.clone()).await;

        let bob = player("Bob");
        let faulty_nav = script_all(ScriptedNavigator::new(Duration::ZERO)).script(
            &bob,
            PageKind::Overview,
            Script::Timeout,
        );
        let (faulty, _) = batch_scraper(faulty_nav, 4);
        let report = faulty.run(roster.clone()).await;

        let bob_key = SlotKey::new(Role::Ally, 1);
        assert_eq!(
            report.get(bob_key).unwrap().overview.error_kind(),
            Some(ErrorKind::Timeout)
        );
        assert_eq!(report.get(bob_key).unwrap().operators.len(), 4);
        for (key, _) in roster.players().into_iter().filter(|(k, _)| *k != bob_key) {
            assert_eq!(report.get(key), baseline.get(key), "{key}");
        }
    }

    #[tokio::test]
    async fn blocked_operators_are_empty_and_blocked_overview_is_an_error() {
        let alice = player("Alice");
        let navigator = ScriptedNavigator::new(Duration::ZERO)
            .script(&alice, PageKind::Overview, Script::Blocked)
            .script(&alice, PageKind::Operators, Script::Blocked);
        let (scraper, _) = batch_scraper(navigator, 2);

        let report = scraper
            .run(Roster::new(Some(alice), vec![], vec![]).unwrap())
            .await;
        let main = report.get(SlotKey::new(Role::Main, 0)).unwrap();

        assert_eq!(main.overview.error_kind(), Some(ErrorKind::Blocked));
        assert!(main.operators.is_empty());
    }

    #[tokio::test]
    async fn panicking_task_is_degraded_not_lost() {
        let carol = player("Carol");
        let navigator = ScriptedNavigator::new(Duration::ZERO)
            .script(&carol, PageKind::Overview, Script::Panic)
            .script(&carol, PageKind::Operators, Script::Page(OPERATORS));
        let (scraper, _) = batch_scraper(navigator, 2);
        let roster = Roster::new(Some(player("Alice")), vec![carol], vec![]).unwrap();

        let report = scraper.run(roster).await;
        let carol = report.get(SlotKey::new(Role::Ally, 1)).unwrap();

        assert_eq!(report.len(), 2);
        assert_eq!(carol.overview.error_kind(), Some(ErrorKind::Internal));
        assert_eq!(carol.operators.len(), 4);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn never_exceeds_worker_cap() {
        let roster = Roster::new(
            Some(player("Alice")),
            vec![player("Bob"), player("Carol"), player("Erin")],
            vec![player("Dave"), player("Frank")],
        )
        .unwrap();
        let (scraper, navigator) = batch_scraper(ScriptedNavigator::new(Duration::from_millis(40)), 3);

        let mut completed = 0;
        let report = scraper
            .run_with_progress(roster, |_| completed += 1)
            .await;

        assert_eq!(report.len(), 6);
        assert_eq!(completed, 12);
        let peak = navigator.max_in_flight.load(Ordering::SeqCst);
        assert!((1..=3).contains(&peak), "peak concurrency {peak}");
    }

    #[tokio::test]
    async fn single_player_uses_callers_permits() {
        let dave = player("Dave");
        let navigator = ScriptedNavigator::new(Duration::ZERO)
            .script(&dave, PageKind::Overview, Script::Page(OVERVIEW))
            .script(&dave, PageKind::Operators, Script::Page(OPERATORS));
        let (scraper, _) = batch_scraper(navigator, 10);
        let key = SlotKey::new(Role::Enemy, 2);

        let snapshot = scraper
            .run_player(dave, key, Arc::new(Semaphore::new(1)))
            .await;

        assert_eq!(snapshot.key(), key);
        assert!(snapshot.overview.stats().is_some());
        assert_eq!(snapshot.operators.len(), 4);
    }

    #[test]
    fn missing_results_degrade_instead_of_disappearing() {
        let roster = Roster::new(Some(player("Alice")), vec![player("Bob")], vec![]).unwrap();
        let only_alice_operators = vec![TaskResult {
            key: SlotKey::new(Role::Main, 0),
            page: PageKind::Operators,
            output: TaskOutput::Operators(vec![OperatorRecord::default()]),
        }];

        let report = assemble(&roster, only_alice_operators);

        assert_eq!(report.len(), 2);
        let alice = report.get(SlotKey::new(Role::Main, 0)).unwrap();
        assert_eq!(alice.operators.len(), 1);
        assert_eq!(alice.overview.error_kind(), Some(ErrorKind::Internal));
        let bob = report.get(SlotKey::new(Role::Ally, 1)).unwrap();
        assert!(bob.operators.is_empty());
    }
}
