use crate::ui;
use alloy::primitives::{
    Address,
    U256,
};
use chrono::{
    DateTime,
    Utc,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use deployments::{
    DeploymentEnv,
    DeploymentRecord,
    DeploymentStore,
};
use generated_abi::networks::chain_label;
use skylines_client::{
    ContractAddresses,
    Network,
    admin::{
        AdminAction,
        AdminActions,
    },
    chain::{
        LotteryChain,
        RpcChain,
    },
    config::PollIntervals,
    errors::report_text,
    history::{
        self,
        Participant,
        RecentParticipants,
        ReferralInfo,
        WinnerEvent,
    },
    join::{
        JoinFlow,
        JoinQuote,
        parse_referrer,
    },
    notifications::{
        Notifier,
        Toast,
        ToastQueue,
    },
    reader::{
        AdminReader,
        AdminStatus,
        ContractData,
        ContractReader,
        UserStatus,
        UserStatusReader,
    },
    wallets,
};
use std::{
    path::PathBuf,
    str::FromStr,
    sync::Arc,
    time::{
        Duration,
        Instant,
    },
};
use tokio::{
    sync::mpsc,
    time,
};
use tracing::{
    info,
    warn,
};
use url::Url;

const REDRAW_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Clone, Debug)]
pub enum WalletConfig {
    FoundryKeystore { name: String, dir: PathBuf },
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub network: Network,
    pub rpc_url: String,
    pub wallet: Option<WalletConfig>,
    pub contract: Option<Address>,
    pub usdc: Option<Address>,
    pub referrer: Option<String>,
    pub site_url: String,
    pub admin_view: bool,
    pub polls: PollIntervals,
    pub recent_limit: usize,
}

pub fn deployment_env(network: Network) -> DeploymentEnv {
    match network {
        Network::BaseMainnet => DeploymentEnv::Mainnet,
        Network::BaseSepolia => DeploymentEnv::Sepolia,
        Network::Local => DeploymentEnv::Local,
    }
}

/// Flags beat the recorded deployment, which beats the built-in table.
pub fn resolve_addresses(
    table: ContractAddresses,
    contract_flag: Option<Address>,
    usdc_flag: Option<Address>,
    record: Option<&DeploymentRecord>,
) -> ContractAddresses {
    let parse = |raw: &str| Address::from_str(raw).ok();
    let recorded_lottery = record.and_then(|r| parse(&r.contract_address));
    let recorded_usdc = record.and_then(|r| r.usdc_address.as_deref().and_then(parse));
    ContractAddresses {
        refboom: contract_flag
            .or(recorded_lottery)
            .unwrap_or(table.refboom),
        usdc: usdc_flag.or(recorded_usdc).unwrap_or(table.usdc),
    }
}

/// Unknown chains read from the Base Sepolia table; anything else must match
/// the network picked on the command line.
pub fn ensure_network(selected: Network, chain_id: u64) -> Result<Network> {
    let reported = Network::for_chain_id_or_default(chain_id);
    if reported != selected {
        return Err(eyre!(
            "Wrong network: the RPC reports {} (chain id {chain_id}) but {selected} was selected. \
             Switch networks or pass a matching --rpc-url.",
            chain_label(chain_id),
        ));
    }
    if Network::from_chain_id(chain_id).is_none() {
        warn!(chain_id, "unsupported chain id; using Base Sepolia addresses");
    }
    Ok(reported)
}

fn recorded_deployment(network: Network, chain_id: u64) -> Option<DeploymentRecord> {
    let env = deployment_env(network);
    let latest = DeploymentStore::new(env).and_then(|store| store.latest());
    match latest {
        Ok(record) => record.filter(|r| r.chain_id == chain_id),
        Err(err) => {
            warn!(%err, %env, "could not read deployment records");
            None
        }
    }
}

pub async fn connect(config: &AppConfig) -> Result<(RpcChain, u64)> {
    let url = Url::parse(&config.rpc_url)
        .wrap_err_with(|| format!("Invalid RPC URL {}", config.rpc_url))?;
    let probe = RpcChain::connect(&url, config.network.addresses(), None, config.polls.receipt);
    let chain_id = probe
        .chain_id()
        .await
        .wrap_err_with(|| format!("Failed to reach RPC at {url}"))?;
    let network = ensure_network(config.network, chain_id)?;

    let record = recorded_deployment(config.network, chain_id);
    let addresses = resolve_addresses(
        network.addresses(),
        config.contract,
        config.usdc,
        record.as_ref(),
    );
    if addresses.is_deployed() {
        info!(lottery = %addresses.refboom, usdc = %addresses.usdc, "using contracts");
    } else {
        warn!("no lottery contract configured; pass --contract or deploy first");
    }

    let signer = match &config.wallet {
        Some(WalletConfig::FoundryKeystore { name, dir }) => {
            let descriptor = wallets::find_wallet(dir, name)?;
            Some(wallets::unlock_wallet(&descriptor)?)
        }
        None => None,
    };
    let chain = RpcChain::connect(&url, addresses, signer, config.polls.receipt);
    Ok((chain, chain_id))
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Funds {
    pub allowance: U256,
    pub balance: U256,
    pub genesis: Option<Address>,
}

#[derive(Clone, Debug)]
pub struct AppSnapshot {
    pub network: Network,
    pub chain_id: u64,
    pub lottery: Address,
    pub account: Option<Address>,
    pub site_url: String,
    pub contract: ContractData,
    pub admin: Option<AdminStatus>,
    pub user: Option<UserStatus>,
    pub funds: Option<Funds>,
    pub recent: Vec<Participant>,
    pub referrals: Vec<ReferralInfo>,
    pub winner_event: Option<WinnerEvent>,
    pub pending: Option<&'static str>,
    pub toasts: Vec<Toast>,
    pub now: DateTime<Utc>,
}

impl AppSnapshot {
    pub fn quote(&self, referrer: Option<Address>) -> Option<JoinQuote> {
        let funds = self.funds.as_ref()?;
        Some(JoinQuote::new(
            referrer,
            funds.genesis,
            self.contract.total_users,
            funds.allowance,
            funds.balance,
        ))
    }

    pub fn has_joined(&self) -> bool {
        self.user.as_ref().is_some_and(|u| u.has_joined)
    }

    pub fn is_admin(&self) -> bool {
        self.admin
            .as_ref()
            .is_some_and(|admin| admin.is_admin(self.account))
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Action {
    ApproveAndJoin(String),
    Approve(Option<Address>),
    Join(Address),
    Admin(AdminAction),
}

impl Action {
    fn label(&self) -> &'static str {
        match self {
            Action::ApproveAndJoin(_) => "approve and join",
            Action::Approve(_) => "approve",
            Action::Join(_) => "join",
            Action::Admin(action) => action.label(),
        }
    }
}

#[derive(Debug)]
struct ActionDone {
    label: &'static str,
    ok: bool,
}

pub struct AppController<C> {
    chain: Arc<C>,
    notifier: Notifier,
    toasts: ToastQueue,
    snapshot: AppSnapshot,
}

impl<C: LotteryChain> AppController<C> {
    pub fn new(
        chain: Arc<C>,
        chain_id: u64,
        network: Network,
        site_url: String,
        notifier: Notifier,
    ) -> Self {
        let snapshot = AppSnapshot {
            network,
            chain_id,
            lottery: chain.lottery_address(),
            account: chain.account(),
            site_url,
            contract: ContractData::default(),
            admin: None,
            user: None,
            funds: None,
            recent: Vec::new(),
            referrals: Vec::new(),
            winner_event: None,
            pending: None,
            toasts: Vec::new(),
            now: Utc::now(),
        };
        Self {
            chain,
            notifier,
            toasts: ToastQueue::default(),
            snapshot,
        }
    }

    pub fn snapshot(&mut self) -> &AppSnapshot {
        self.snapshot.now = Utc::now();
        self.snapshot.toasts = self.toasts.visible().to_vec();
        &self.snapshot
    }

    fn apply(&mut self, event: SyncEvent) {
        match event {
            SyncEvent::Contract(update) => {
                self.snapshot.contract = update.data;
                self.snapshot.admin = update.admin;
                self.snapshot.recent = update.recent;
                self.snapshot.winner_event = update.winner_event;
            }
            SyncEvent::User(update) => {
                self.snapshot.user = update.status;
                self.snapshot.referrals = update.referrals;
                self.snapshot.funds = update.funds;
            }
        }
    }

    fn push_toast(&mut self, toast: Toast) {
        self.toasts.push(toast);
    }

    fn prune_toasts(&mut self, now: Instant) {
        self.toasts.prune(now);
    }

    /// Only one write is in flight at a time; the approve-then-join sequence
    /// depends on the allowance it just set.
    fn start(&mut self, action: Action, done: &mpsc::UnboundedSender<ActionDone>) {
        if let Some(pending) = self.snapshot.pending {
            self.notifier
                .info(format!("Please wait: {pending} is still in progress"));
            return;
        }
        let label = action.label();
        self.snapshot.pending = Some(label);
        info!(action = label, "starting transaction");
        tokio::spawn(run_action(
            self.chain.clone(),
            self.notifier.clone(),
            action,
            done.clone(),
        ));
    }

    fn finish(&mut self, done: ActionDone) {
        info!(action = done.label, ok = done.ok, "transaction finished");
        self.snapshot.pending = None;
    }
}

async fn run_action<C: LotteryChain>(
    chain: Arc<C>,
    notifier: Notifier,
    action: Action,
    done: mpsc::UnboundedSender<ActionDone>,
) {
    let label = action.label();
    let result = match action {
        Action::ApproveAndJoin(input) => JoinFlow::new(chain, notifier)
            .approve_and_join(&input)
            .await
            .map(|_| ()),
        Action::Approve(referrer) => JoinFlow::new(chain, notifier)
            .approve(referrer)
            .await
            .map(|_| ()),
        Action::Join(referrer) => JoinFlow::new(chain, notifier)
            .join(referrer)
            .await
            .map(|_| ()),
        Action::Admin(action) => AdminActions::new(chain, notifier)
            .run(action)
            .await
            .map(|_| ()),
    };
    if let Err(err) = &result {
        warn!(action = label, error = %report_text(err), "transaction failed");
    }
    let _ = done.send(ActionDone {
        label,
        ok: result.is_ok(),
    });
}

#[derive(Clone, Debug)]
struct ContractUpdate {
    data: ContractData,
    admin: Option<AdminStatus>,
    recent: Vec<Participant>,
    winner_event: Option<WinnerEvent>,
}

#[derive(Clone, Debug)]
struct UserUpdate {
    status: Option<UserStatus>,
    referrals: Vec<ReferralInfo>,
    funds: Option<Funds>,
}

enum SyncCommand {
    RefreshNow,
    Shutdown,
}

enum SyncEvent {
    Contract(ContractUpdate),
    User(UserUpdate),
}

struct SyncState<C> {
    chain: Arc<C>,
    contract: ContractReader<C>,
    user: UserStatusReader<C>,
    admin: AdminReader<C>,
    recent: RecentParticipants,
    bootstrapped: bool,
    winner_event: Option<WinnerEvent>,
    referrals: Vec<ReferralInfo>,
    funds: Option<Funds>,
    genesis: Option<Address>,
}

impl<C: LotteryChain> SyncState<C> {
    fn new(chain: Arc<C>, recent_limit: usize) -> Self {
        Self {
            contract: ContractReader::new(chain.clone()),
            user: UserStatusReader::new(chain.clone()),
            admin: AdminReader::new(chain.clone()),
            chain,
            recent: RecentParticipants::new(recent_limit),
            bootstrapped: false,
            winner_event: None,
            referrals: Vec::new(),
            funds: None,
            genesis: None,
        }
    }

    async fn contract_tick(&mut self) -> ContractUpdate {
        let data = self.contract.refresh().await.clone();
        let admin = self.admin.refresh().await.cloned();
        if data.deployed {
            self.sync_recent().await;
            match history::latest_winner_event(&*self.chain).await {
                Ok(event) => self.winner_event = event,
                Err(err) => warn!(?err, "winner event scan failed"),
            }
        }
        ContractUpdate {
            data,
            admin,
            recent: self.recent.entries().to_vec(),
            winner_event: self.winner_event.clone(),
        }
    }

    async fn sync_recent(&mut self) {
        if !self.bootstrapped {
            match self.recent.bootstrap(&*self.chain).await {
                Ok(()) => self.bootstrapped = true,
                Err(err) => warn!(?err, "recent participants backfill failed"),
            }
        } else if let Err(err) = self.recent.poll_live(&*self.chain, Utc::now()).await {
            warn!(?err, "live join poll failed");
        }
    }

    async fn user_tick(&mut self) -> UserUpdate {
        let status = self.user.refresh(Utc::now()).await.cloned();
        if let Some(account) = self.chain.account()
            && !self.chain.lottery_address().is_zero()
        {
            match history::load_referrals(&*self.chain, account).await {
                Ok(referrals) => self.referrals = referrals,
                Err(err) => warn!(?err, "referral scan failed"),
            }
            match self.read_funds(account).await {
                Ok(funds) => self.funds = Some(funds),
                Err(err) => warn!(?err, "allowance/balance read failed"),
            }
        }
        UserUpdate {
            status,
            referrals: self.referrals.clone(),
            funds: self.funds.clone(),
        }
    }

    async fn read_funds(&mut self, account: Address) -> Result<Funds> {
        let genesis = match self.genesis {
            Some(genesis) => genesis,
            None => {
                let genesis = self.chain.genesis_referrer().await?;
                self.genesis = Some(genesis);
                genesis
            }
        };
        Ok(Funds {
            allowance: self.chain.allowance(account).await?,
            balance: self.chain.balance_of(account).await?,
            genesis: Some(genesis),
        })
    }
}

fn send_event(tx: &mpsc::UnboundedSender<SyncEvent>, event: SyncEvent) -> Result<()> {
    tx.send(event)
        .map_err(|_| eyre!("sync event receiver dropped"))
}

async fn sync_worker<C: LotteryChain>(
    mut state: SyncState<C>,
    polls: PollIntervals,
    mut cmd_rx: mpsc::UnboundedReceiver<SyncCommand>,
    event_tx: mpsc::UnboundedSender<SyncEvent>,
) -> Result<()> {
    let mut contract_ticker = time::interval(polls.contract);
    let mut user_ticker = time::interval(polls.user);

    loop {
        tokio::select! {
            _ = contract_ticker.tick() => {
                let update = state.contract_tick().await;
                send_event(&event_tx, SyncEvent::Contract(update))?;
            }
            _ = user_ticker.tick() => {
                let update = state.user_tick().await;
                send_event(&event_tx, SyncEvent::User(update))?;
            }
            cmd = cmd_rx.recv() => {
                let Some(cmd) = cmd else {
                    break;
                };
                match cmd {
                    SyncCommand::RefreshNow => {
                        let update = state.contract_tick().await;
                        send_event(&event_tx, SyncEvent::Contract(update))?;
                        let update = state.user_tick().await;
                        send_event(&event_tx, SyncEvent::User(update))?;
                    }
                    SyncCommand::Shutdown => break,
                }
            }
        }
    }
    Ok(())
}

pub async fn run_app(config: AppConfig) -> Result<()> {
    let (chain, chain_id) = connect(&config).await?;
    let chain = Arc::new(chain);
    let (notifier, toast_rx) = Notifier::channel();
    let controller = AppController::new(
        chain,
        chain_id,
        config.network,
        config.site_url.clone(),
        notifier,
    );
    let mut ui_state = ui::UiState::new(config.referrer.clone(), config.admin_view);
    let mut input_events = ui::input_event_stream();

    info!("Starting UI");
    ui::terminal_enter(&mut ui_state)?;
    let res = run_loop(
        controller,
        &mut ui_state,
        &mut input_events,
        toast_rx,
        config.polls,
        config.recent_limit,
    )
    .await;
    ui::terminal_exit()?;
    res
}

async fn run_loop<C: LotteryChain>(
    mut controller: AppController<C>,
    ui_state: &mut ui::UiState,
    input_events: &mut ui::InputEventReceiver,
    mut toast_rx: mpsc::UnboundedReceiver<Toast>,
    polls: PollIntervals,
    recent_limit: usize,
) -> Result<()> {
    info!("Running app loop");
    let (sync_cmd_tx, sync_cmd_rx) = mpsc::unbounded_channel();
    let (sync_event_tx, mut sync_event_rx) = mpsc::unbounded_channel();
    let sync_handle = tokio::spawn(sync_worker(
        SyncState::new(controller.chain.clone(), recent_limit),
        polls,
        sync_cmd_rx,
        sync_event_tx,
    ));
    let (done_tx, mut done_rx) = mpsc::unbounded_channel();
    let mut redraw = time::interval(REDRAW_INTERVAL);
    let mut sync_worker_closed = false;

    loop {
        tokio::select! {
            maybe_event = sync_event_rx.recv() => {
                let Some(event) = maybe_event else {
                    warn!("sync worker channel closed");
                    sync_worker_closed = true;
                    break;
                };
                controller.apply(event);
            }
            Some(toast) = toast_rx.recv() => {
                controller.push_toast(toast);
            }
            Some(done) = done_rx.recv() => {
                controller.finish(done);
                let _ = sync_cmd_tx.send(SyncCommand::RefreshNow);
            }
            _ = redraw.tick() => {
                controller.prune_toasts(Instant::now());
            }
            _ = tokio::signal::ctrl_c() => {
                break;
            }
            raw_ev = ui::next_raw_event(input_events) => {
                let event = raw_ev?;
                let Some(ev) = ui::interpret_event(ui_state, event) else {
                    continue;
                };
                match ev {
                    ui::UserEvent::Quit => break,
                    ui::UserEvent::Redraw => {}
                    ui::UserEvent::Refresh => {
                        let _ = sync_cmd_tx.send(SyncCommand::RefreshNow);
                    }
                    ui::UserEvent::ApproveAndJoin(input) => {
                        controller.start(Action::ApproveAndJoin(input), &done_tx);
                    }
                    ui::UserEvent::Approve(input) => {
                        let referrer = parse_referrer(&input).ok();
                        controller.start(Action::Approve(referrer), &done_tx);
                    }
                    ui::UserEvent::Join(input) => match parse_referrer(&input) {
                        Ok(referrer) => controller.start(Action::Join(referrer), &done_tx),
                        Err(rejection) => controller.notifier.error("join", rejection.to_string()),
                    },
                    ui::UserEvent::Admin(action) => {
                        controller.start(Action::Admin(action), &done_tx);
                    }
                }
            }
        }
        ui::draw(ui_state, controller.snapshot()).wrap_err("draw failed")?;
    }

    let _ = sync_cmd_tx.send(SyncCommand::Shutdown);
    match sync_handle.await {
        Ok(Ok(())) => {
            if sync_worker_closed {
                return Err(eyre!(
                    "Sync worker exited unexpectedly; check the RPC connection"
                ));
            }
        }
        Ok(Err(err)) => {
            return Err(err).wrap_err("sync worker failed");
        }
        Err(err) => {
            return Err(eyre!(err)).wrap_err("sync worker panicked");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use generated_abi::networks::{
        BASE_MAINNET_USDC,
        BASE_SEPOLIA_USDC,
    };

    fn record(contract: &str, usdc: Option<&str>) -> DeploymentRecord {
        let mut record = DeploymentRecord::new(
            contract.to_string(),
            "hash".to_string(),
            "https://sepolia.base.org".to_string(),
            84532,
        );
        record.usdc_address = usdc.map(str::to_string);
        record
    }

    #[test]
    fn resolve_addresses__flag_beats_record_and_table() {
        // given
        let flag = Address::repeat_byte(0x01);
        let recorded = record("0x0202020202020202020202020202020202020202", None);

        // when
        let addresses = resolve_addresses(
            Network::BaseSepolia.addresses(),
            Some(flag),
            None,
            Some(&recorded),
        );

        // then
        assert_eq!(addresses.refboom, flag);
        assert_eq!(addresses.usdc, BASE_SEPOLIA_USDC);
    }

    #[test]
    fn resolve_addresses__record_beats_table() {
        // given
        let recorded = record(
            "0x0202020202020202020202020202020202020202",
            Some("0x0303030303030303030303030303030303030303"),
        );

        // when
        let addresses =
            resolve_addresses(Network::BaseSepolia.addresses(), None, None, Some(&recorded));

        // then
        assert_eq!(addresses.refboom, Address::repeat_byte(0x02));
        assert_eq!(addresses.usdc, Address::repeat_byte(0x03));
        assert!(addresses.is_deployed());
    }

    #[test]
    fn resolve_addresses__nothing_configured__is_not_deployed() {
        let addresses = resolve_addresses(Network::BaseMainnet.addresses(), None, None, None);
        assert!(!addresses.is_deployed());
        assert_eq!(addresses.usdc, BASE_MAINNET_USDC);
    }

    #[test]
    fn ensure_network__mismatch_asks_to_switch() {
        let err = ensure_network(Network::BaseMainnet, 84532).unwrap_err();
        assert!(err.to_string().contains("Wrong network"));
        assert!(err.to_string().contains("Base Sepolia"));
    }

    #[test]
    fn ensure_network__unsupported_chain_falls_back_to_sepolia() {
        assert_eq!(
            ensure_network(Network::BaseSepolia, 10).unwrap(),
            Network::BaseSepolia
        );
        assert!(ensure_network(Network::Local, 10).is_err());
    }

    #[test]
    fn deployment_env__maps_each_network() {
        assert_eq!(deployment_env(Network::BaseMainnet), DeploymentEnv::Mainnet);
        assert_eq!(deployment_env(Network::BaseSepolia), DeploymentEnv::Sepolia);
        assert_eq!(deployment_env(Network::Local), DeploymentEnv::Local);
    }
}
