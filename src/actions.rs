//! Workflow orchestration
//!
//! [`Actions`] drives every user-visible workflow: it talks to the node,
//! derives contribution addresses and writes the results into the
//! [`EntityStore`]. Each public method is a failure boundary. Errors are
//! flattened with [`ext_err`] into the store's error fields and never returned.
//!
//! Remote calls are issued one at a time. A node busy with a rescan serializes
//! RPC handling anyway, and sequential loops let partial results be published
//! item by item.

use chrono::Utc;
use std::sync::Arc;

use crate::config::ClientConfig;
use crate::derive::{derive_contribution, Network, MAX_INDEX};
use crate::error::{ext_err, ClientError, DeriveError, Result};
use crate::memo::{encode_hex_memo, make_contribution_memo};
use crate::node::{BlockchainInfo, GroupedAddress, NodeConnector, NodeGateway, SendAmount};
use crate::settings::{Settings, SettingsStore};
use crate::store::{
    Address, AddressPatch, Contribution, ContributionPatch, Emit, EntityStore, Nav,
    OperationPatch, PagePatch, StateField, DEFAULT_PER_PAGE,
};
use crate::watcher::{fetch_operation_update, OperationWatcher};

pub struct Actions {
    config: ClientConfig,
    store: Arc<EntityStore>,
    connector: Arc<dyn NodeConnector>,
    settings_store: SettingsStore,
    watcher: OperationWatcher,
}

impl Actions {
    // ============================================================================
    // Constructor
    // ============================================================================

    pub fn new(config: ClientConfig, connector: Arc<dyn NodeConnector>) -> Self {
        let store = Arc::new(EntityStore::new(config.throttle_window));
        let watcher = OperationWatcher::new(Arc::clone(&store), config.poll_interval);
        let settings_store = SettingsStore::new(config.settings_path.clone());

        Self {
            config,
            store,
            connector,
            settings_store,
            watcher,
        }
    }

    pub fn store(&self) -> &Arc<EntityStore> {
        &self.store
    }

    pub fn watcher(&self) -> &OperationWatcher {
        &self.watcher
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    // ============================================================================
    // Settings
    // ============================================================================

    /// Load persisted settings and check that the node answers
    pub async fn init_settings(&self) {
        let settings = self.settings_store.load().unwrap_or_else(|e| {
            log::warn!("Could not load settings, using defaults: {}", e);
            Settings::default()
        });
        let url = settings.rpc_url.clone();
        self.store.set_many(
            vec![
                StateField::Settings(settings),
                StateField::SettingsPath(self.settings_store.path().display().to_string()),
                StateField::Initializing(true),
            ],
            Emit::Silent,
        );
        self.set_status(format!("checking... {}", url));

        match self.check_network().await {
            Ok(info) => {
                log::info!("Connected to {} ({} chain)", url, info.chain);
                self.store.set_many(
                    vec![
                        StateField::Status("welcome".to_string()),
                        StateField::Nav(Nav::Home),
                        StateField::Info(info),
                        StateField::Initializing(false),
                    ],
                    Emit::Immediate,
                );
            }
            Err(e) => {
                log::error!("Could not reach node at {}: {}", url, e);
                self.store.set_many(
                    vec![
                        StateField::Status(String::new()),
                        StateField::Nav(Nav::Settings),
                        StateField::NetworkError(ext_err(&e)),
                        StateField::Initializing(false),
                    ],
                    Emit::Immediate,
                );
            }
        }
    }

    /// Try new settings against the node and persist them only if it answers
    pub async fn set_settings(&self, settings: Settings) {
        self.store
            .set_scalar(StateField::Settings(settings.clone()), Emit::Silent);

        match self.check_network().await {
            Ok(info) => {
                self.store.set_many(
                    vec![
                        StateField::Info(info),
                        StateField::Nav(Nav::Home),
                        StateField::EditSettings(false),
                        StateField::NetworkError(String::new()),
                    ],
                    Emit::Immediate,
                );
                if let Err(e) = self.settings_store.save(&settings) {
                    self.fail(e.into());
                }
            }
            Err(e) => {
                log::error!("Rejected settings for {}: {}", settings.rpc_url, e);
                self.reset_settings(true);
                self.store
                    .set_scalar(StateField::NetworkError(ext_err(&e)), Emit::Immediate);
            }
        }
    }

    /// Restore default settings and send the user to the settings screen
    pub fn reset_settings(&self, silent: bool) {
        let emit = if silent { Emit::Silent } else { Emit::Immediate };
        self.store.set_many(
            vec![
                StateField::Settings(Settings::default()),
                StateField::Nav(Nav::Settings),
            ],
            emit,
        );
    }

    pub fn navigate(&self, nav: Nav) {
        self.store.set_scalar(StateField::Nav(nav), Emit::Immediate);
    }

    pub fn select_send_from(&self, address: Option<Address>) {
        self.store
            .set_scalar(StateField::SendFrom(address), Emit::Immediate);
    }

    // ============================================================================
    // Chain info
    // ============================================================================

    pub async fn get_info(&self) {
        let state = self.store.read();
        let status = if state.info_loaded {
            "loading info...".to_string()
        } else {
            format!("connecting to {}...", state.settings.rpc_url)
        };
        self.store.set_many(
            vec![StateField::Status(status), StateField::InfoLoading(true)],
            Emit::Immediate,
        );

        match self.check_network().await {
            Ok(info) => {
                self.store.set_many(
                    vec![StateField::Info(info), StateField::InfoLoaded(true)],
                    Emit::Immediate,
                );
            }
            Err(e) => self.fail(e),
        }

        self.store.set_many(
            vec![
                StateField::InfoLoading(false),
                StateField::Status(String::new()),
            ],
            Emit::Immediate,
        );
    }

    // ============================================================================
    // Addresses
    // ============================================================================

    /// Load wallet balances and every address the wallet owns or watches
    pub async fn get_current_addresses(&self) {
        if let Err(e) = self.load_addresses().await {
            self.fail(e);
            self.store.set_many(
                vec![
                    StateField::AddressesLoading(false),
                    StateField::Status(String::new()),
                ],
                Emit::Immediate,
            );
        }
    }

    /// Reload addresses, then show the first page
    pub async fn init_address_list(&self) {
        self.store
            .set_scalar(StateField::AddressPageLoading(true), Emit::Immediate);
        self.get_current_addresses().await;
        self.populate_address_list(0, DEFAULT_PER_PAGE);
    }

    /// Recompute the address page from the address map
    pub fn populate_address_list(&self, page: usize, per_page: usize) {
        self.store
            .set_scalar(StateField::AddressPageLoading(true), Emit::Immediate);
        let items = self.store.paginate::<Address>(page, per_page);
        self.store
            .replace_page(PagePatch::full(items, page, per_page), Emit::Immediate);
        self.store
            .set_scalar(StateField::AddressPageLoading(false), Emit::Immediate);
    }

    async fn load_addresses(&self) -> Result<()> {
        let node = self.node()?;
        self.store
            .set_scalar(StateField::AddressesLoading(true), Emit::Immediate);

        let totals = node.get_total_balances().await?;
        self.store
            .set_scalar(StateField::TotalBalances(totals), Emit::Immediate);

        self.set_status("loading T addresses...");
        let grouped: Vec<GroupedAddress> = node
            .list_address_groupings()
            .await?
            .into_iter()
            .flatten()
            .collect();
        log::debug!("Validating {} grouped addresses", grouped.len());

        for entry in grouped {
            let validation = node.validate_address(&entry.address).await?;
            if !validation.in_wallet() {
                log::debug!("Skipping {}, not in wallet", entry.address);
                continue;
            }
            self.store.merge_entity(
                AddressPatch {
                    address: entry.address,
                    balance: Some(entry.balance),
                    account: Some(entry.account),
                    in_wallet: Some(true),
                    is_mine: Some(validation.ismine),
                },
                Emit::Immediate,
            );
        }

        self.set_status("loading Z addresses");
        for address in node.list_shielded_addresses().await? {
            self.set_status("get balance for z-addr");
            let balance = node.get_shielded_balance(&address).await?;
            self.store.merge_entity(
                AddressPatch {
                    address,
                    balance: Some(balance),
                    account: Some(String::new()),
                    ..Default::default()
                },
                Emit::Immediate,
            );
        }

        self.store.set_many(
            vec![
                StateField::AddressesLoading(false),
                StateField::AddressesLoaded(true),
                StateField::Status(String::new()),
            ],
            Emit::Immediate,
        );
        Ok(())
    }

    // ============================================================================
    // Contributions
    // ============================================================================

    /// Derive one page of contribution addresses and fill in their wallet state
    pub async fn get_contributions(&self, page: usize, per_page: usize) {
        if let Err(e) = self.load_contributions(page, per_page).await {
            self.fail(e);
            self.store.set_many(
                vec![
                    StateField::ContributionsLoading(false),
                    StateField::Status(String::new()),
                ],
                Emit::Immediate,
            );
        }
    }

    async fn load_contributions(&self, page: usize, per_page: usize) -> Result<()> {
        let state = self.store.read();
        if state.settings.xpub.is_empty() {
            return Err(ClientError::MissingXpub);
        }
        let xpub = state.settings.xpub.clone();
        let network = Network::from_chain(&state.info.chain)?;
        let node = self.node()?;

        let start = page.saturating_mul(per_page);
        let last = start.saturating_add(per_page.saturating_sub(1));
        if per_page > 0 && last > MAX_INDEX as usize {
            let index = u32::try_from(last).unwrap_or(u32::MAX);
            return Err(DeriveError::IndexOutOfRange(index).into());
        }

        self.store.set_many(
            vec![
                StateField::Status("loading contributions...".to_string()),
                StateField::ContributionsLoading(true),
            ],
            Emit::Immediate,
        );
        self.store.replace_page(
            PagePatch::full(Vec::<Contribution>::new(), page, per_page),
            Emit::Immediate,
        );

        // Placeholders first so the page shows up before any RPC completes
        let mut items = Vec::new();
        for position in start..start + per_page {
            let index = u32::try_from(position).unwrap_or(u32::MAX);
            let (address, path) = derive_contribution(&xpub, index, network)?;
            self.store.merge_entity(
                ContributionPatch {
                    address: address.clone(),
                    path: Some(path.clone()),
                    ..Default::default()
                },
                Emit::Immediate,
            );
            items.push(Contribution {
                address,
                path,
                ..Default::default()
            });
        }
        self.store
            .replace_page(PagePatch::items(items.clone()), Emit::Immediate);

        let mut page_items = items.clone();
        for (position, item) in items.into_iter().enumerate() {
            let updated = self.updated_contribution(node.as_ref(), item).await?;
            page_items[position] = updated.clone();
            self.store
                .merge_entity(ContributionPatch::from(updated), Emit::Immediate);
            self.store
                .replace_page(PagePatch::items(page_items.clone()), Emit::Immediate);
        }

        tokio::time::sleep(self.config.settle_pause).await;
        self.store.set_many(
            vec![
                StateField::ContributionsLoading(false),
                StateField::ContributionsLoaded(true),
                StateField::Status(String::new()),
            ],
            Emit::Immediate,
        );
        Ok(())
    }

    /// Import every known contribution address the wallet doesn't have yet
    ///
    /// Only the last import triggers a rescan; it must not have been imported
    /// before or the node skips the rescan.
    pub async fn add_contributions(&self) {
        self.store
            .set_scalar(StateField::ContributionsAdding(true), Emit::Immediate);

        let mut done = vec![
            StateField::ContributionsAdding(false),
            StateField::Status(String::new()),
        ];
        match self.import_contributions().await {
            Ok(()) => done.push(StateField::Nav(Nav::AddedToWallet)),
            Err(e) => self.fail(e),
        }
        // Same channel as the re-query merges, so a trailing delivery of
        // those can't land after this one
        self.store.set_many(done, Emit::Throttled);
    }

    async fn import_contributions(&self) -> Result<()> {
        let node = self.node()?;
        let candidates: Vec<Contribution> = self
            .store
            .read()
            .contributions
            .values()
            .filter(|c| !c.in_wallet)
            .cloned()
            .collect();

        let Some((last, rest)) = candidates.split_last() else {
            log::info!("No contributions to import");
            return Ok(());
        };
        log::info!("Importing {} contribution addresses", candidates.len());

        for c in rest {
            self.set_status(format!("add {} {}...", c.path, c.address));
            if let Err(e) = node.import_address(&c.address, &c.path, false).await {
                let message = ext_err(&ClientError::from(e));
                log::warn!("Import of {} failed: {}", c.address, message);
                self.set_status(message.clone());
                self.store
                    .add_log(format!("import {} failed: {}", c.address, message));
                tokio::time::sleep(self.config.import_retry_pause).await;
            }
        }

        self.set_status("rescanning...");
        node.import_address(&last.address, &last.path, true).await?;

        self.set_status("updating address info...");
        for c in candidates {
            let updated = self.updated_contribution(node.as_ref(), c).await?;
            self.store
                .merge_entity(ContributionPatch::from(updated), Emit::Throttled);
        }
        Ok(())
    }

    async fn updated_contribution(
        &self,
        node: &dyn NodeGateway,
        contribution: Contribution,
    ) -> Result<Contribution> {
        let validation = node.validate_address(&contribution.address).await?;
        let in_wallet = validation.in_wallet();
        let balance = if in_wallet {
            node.get_shielded_balance(&contribution.address).await?
        } else {
            0.0
        };

        Ok(Contribution {
            balance,
            in_wallet,
            is_mine: validation.ismine,
            ..contribution
        })
    }

    // ============================================================================
    // Sending
    // ============================================================================

    /// Send `amount` with an optional plain-text memo and watch the operation
    pub async fn send_coins(&self, from: &str, to: &str, amount: f64, memo: &str) {
        let memo_hex = (!memo.is_empty()).then(|| encode_hex_memo(memo));
        self.send_with_memo(from, to, amount, memo_hex).await;
    }

    /// Send a payment tagged with a Grant.io contribution memo
    pub async fn send_contribution(&self, from: &str, to: &str, amount: f64, contribution_id: u64) {
        let memo_hex = Some(make_contribution_memo(contribution_id));
        self.send_with_memo(from, to, amount, memo_hex).await;
    }

    async fn send_with_memo(&self, from: &str, to: &str, amount: f64, memo_hex: Option<String>) {
        self.store.set_many(
            vec![
                StateField::SendingCoins(true),
                StateField::Status("Sending coins...".to_string()),
            ],
            Emit::Immediate,
        );

        if let Err(e) = self.submit_send(from, to, amount, memo_hex).await {
            self.fail(e);
        }

        self.store.set_many(
            vec![
                StateField::SendingCoins(false),
                StateField::Status(String::new()),
            ],
            Emit::Immediate,
        );
    }

    async fn submit_send(
        &self,
        from: &str,
        to: &str,
        amount: f64,
        memo_hex: Option<String>,
    ) -> Result<String> {
        let node = self.node()?;
        let amounts = vec![SendAmount {
            address: to.to_string(),
            amount,
            memo: memo_hex,
        }];
        let operation_id = node.send_many(from, amounts).await?;
        log::info!("Sending {} from {} to {}: {}", amount, from, to, operation_id);

        self.store.merge_entity(
            OperationPatch {
                id: operation_id.clone(),
                created: Some(Utc::now().timestamp_millis()),
                ..Default::default()
            },
            Emit::Immediate,
        );
        let update = fetch_operation_update(node.as_ref(), &operation_id).await?;
        self.store.merge_entity(update, Emit::Immediate);

        self.watcher.watch(node, &operation_id);
        Ok(operation_id)
    }

    // ============================================================================
    // Helpers
    // ============================================================================

    fn node(&self) -> Result<Arc<dyn NodeGateway>> {
        Ok(self.connector.connect(&self.store.read().settings)?)
    }

    async fn check_network(&self) -> Result<BlockchainInfo> {
        let info = self.node()?.get_blockchain_info().await?;
        log::debug!("Node on {} at height {}", info.chain, info.blocks);
        Ok(info)
    }

    fn set_status(&self, status: impl Into<String>) {
        self.store
            .set_scalar(StateField::Status(status.into()), Emit::Immediate);
    }

    fn fail(&self, error: ClientError) {
        let message = ext_err(&error);
        log::error!("{}", message);
        self.store
            .set_scalar(StateField::Error(message), Emit::Immediate);
    }
}
