//! Application state and the entities mirrored from the node
//!
//! Every entity kind has a default template (its `Default` impl) and a patch
//! type carrying the identity key plus optional values for the other fields.

use indexmap::IndexMap;

use crate::node::{BlockchainInfo, TotalBalances};
use crate::settings::Settings;

/// Entities keyed by identity, in the order they were first merged
pub type EntityMap<V> = IndexMap<String, V>;

/// Default number of rows in a paginated view
pub const DEFAULT_PER_PAGE: usize = 20;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Address {
    pub address: String,
    pub balance: f64,
    pub account: String,
    pub in_wallet: bool,
    pub is_mine: bool,
}

/// Receiving address derived from the xpub at `m/0/{index}`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Contribution {
    pub address: String,
    pub balance: f64,
    pub path: String,
    pub in_wallet: bool,
    pub is_mine: bool,
}

/// Async send tracked by its node operation id
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Operation {
    pub id: String,
    pub from: String,
    pub to: String,
    pub amount: f64,
    pub memo: String,
    /// Milliseconds since the epoch
    pub created: i64,
    pub checked: i64,
    pub status: String,
    pub txid: String,
    pub confirmations: u64,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AddressPatch {
    pub address: String,
    pub balance: Option<f64>,
    pub account: Option<String>,
    pub in_wallet: Option<bool>,
    pub is_mine: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContributionPatch {
    pub address: String,
    pub balance: Option<f64>,
    pub path: Option<String>,
    pub in_wallet: Option<bool>,
    pub is_mine: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperationPatch {
    pub id: String,
    pub from: Option<String>,
    pub to: Option<String>,
    pub amount: Option<f64>,
    pub memo: Option<String>,
    pub created: Option<i64>,
    pub checked: Option<i64>,
    pub status: Option<String>,
    pub txid: Option<String>,
    pub confirmations: Option<u64>,
    pub error: Option<String>,
}

/// Paginated snapshot of a keyed collection
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub per_page: usize,
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            page: 0,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PagePatch<T> {
    pub items: Option<Vec<T>>,
    pub page: Option<usize>,
    pub per_page: Option<usize>,
}

impl<T> Default for PagePatch<T> {
    fn default() -> Self {
        Self {
            items: None,
            page: None,
            per_page: None,
        }
    }
}

impl<T> PagePatch<T> {
    pub fn items(items: Vec<T>) -> Self {
        Self {
            items: Some(items),
            ..Self::default()
        }
    }

    pub fn full(items: Vec<T>, page: usize, per_page: usize) -> Self {
        Self {
            items: Some(items),
            page: Some(page),
            per_page: Some(per_page),
        }
    }

    pub(crate) fn apply(self, target: &mut Page<T>) {
        if let Some(items) = self.items {
            target.items = items;
        }
        if let Some(page) = self.page {
            target.page = page;
        }
        if let Some(per_page) = self.per_page {
            target.per_page = per_page;
        }
    }
}

/// Where the UI should be
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Nav {
    #[default]
    Home,
    Info,
    Addresses,
    Send,
    SendingCoins,
    Contributions,
    AddToWallet,
    AddedToWallet,
    Settings,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppState {
    pub initializing: bool,
    pub status: String,
    pub error: String,
    pub nav: Nav,

    pub settings: Settings,
    pub settings_path: String,
    pub edit_settings: bool,
    pub network_error: String,

    pub info: BlockchainInfo,
    pub info_loaded: bool,
    pub info_loading: bool,

    pub total_balances: TotalBalances,

    pub addresses: EntityMap<Address>,
    pub addresses_loaded: bool,
    pub addresses_loading: bool,
    pub address_page: Page<Address>,
    pub address_page_loading: bool,

    pub send_from: Option<Address>,
    pub sending_coins: bool,

    pub contributions: EntityMap<Contribution>,
    pub contributions_loaded: bool,
    pub contributions_loading: bool,
    pub contributions_adding: bool,
    pub contribution_page: Page<Contribution>,

    pub operations: EntityMap<Operation>,
    pub is_watch_operation: bool,

    pub log: Vec<String>,
}

impl AppState {
    /// Most recently created operation
    pub fn latest_operation(&self) -> Option<&Operation> {
        self.operations.values().max_by_key(|op| op.created)
    }
}

/// A keyed collection member of [`AppState`]
pub trait Entity: Clone + Default + Send + Sync + 'static {
    fn key(&self) -> &str;
    fn map(state: &AppState) -> &EntityMap<Self>;
    fn map_mut(state: &mut AppState) -> &mut EntityMap<Self>;
}

/// An entity with a paginated view ordered by balance
pub trait Paged: Entity {
    fn balance(&self) -> f64;
    fn page_mut(state: &mut AppState) -> &mut Page<Self>;
}

/// Partial update of one entity, addressed by its identity key
pub trait EntityPatch: Send + 'static {
    type Target: Entity;

    fn key(&self) -> &str;

    /// Overlay the supplied fields onto `target`
    fn apply(self, target: &mut Self::Target);
}

/// Merge `patch` into `map`, materializing a missing entry from the default template
///
/// An existing entry keeps its position; a new one is appended.
pub fn merge_into<P: EntityPatch>(map: &mut EntityMap<P::Target>, patch: P) {
    let key = patch.key().to_string();
    let mut entry = map.get(&key).cloned().unwrap_or_default();
    patch.apply(&mut entry);
    map.insert(key, entry);
}

/// Rows of page `page` ordered by descending balance
///
/// Equal balances keep the map's iteration order.
pub fn paginate<E: Paged>(map: &EntityMap<E>, page: usize, per_page: usize) -> Vec<E> {
    let mut all: Vec<&E> = map.values().collect();
    all.sort_by(|a, b| b.balance().total_cmp(&a.balance()));
    all.into_iter()
        .skip(page.saturating_mul(per_page))
        .take(per_page)
        .cloned()
        .collect()
}

macro_rules! overlay {
    ($patch:ident, $target:ident, $($field:ident),+) => {
        $(
            if let Some(value) = $patch.$field {
                $target.$field = value;
            }
        )+
    };
}

impl Entity for Address {
    fn key(&self) -> &str {
        &self.address
    }

    fn map(state: &AppState) -> &EntityMap<Self> {
        &state.addresses
    }

    fn map_mut(state: &mut AppState) -> &mut EntityMap<Self> {
        &mut state.addresses
    }
}

impl Paged for Address {
    fn balance(&self) -> f64 {
        self.balance
    }

    fn page_mut(state: &mut AppState) -> &mut Page<Self> {
        &mut state.address_page
    }
}

impl EntityPatch for AddressPatch {
    type Target = Address;

    fn key(&self) -> &str {
        &self.address
    }

    fn apply(self, target: &mut Address) {
        target.address = self.address;
        overlay!(self, target, balance, account, in_wallet, is_mine);
    }
}

impl From<Address> for AddressPatch {
    fn from(a: Address) -> Self {
        Self {
            address: a.address,
            balance: Some(a.balance),
            account: Some(a.account),
            in_wallet: Some(a.in_wallet),
            is_mine: Some(a.is_mine),
        }
    }
}

impl Entity for Contribution {
    fn key(&self) -> &str {
        &self.address
    }

    fn map(state: &AppState) -> &EntityMap<Self> {
        &state.contributions
    }

    fn map_mut(state: &mut AppState) -> &mut EntityMap<Self> {
        &mut state.contributions
    }
}

impl Paged for Contribution {
    fn balance(&self) -> f64 {
        self.balance
    }

    fn page_mut(state: &mut AppState) -> &mut Page<Self> {
        &mut state.contribution_page
    }
}

impl EntityPatch for ContributionPatch {
    type Target = Contribution;

    fn key(&self) -> &str {
        &self.address
    }

    fn apply(self, target: &mut Contribution) {
        target.address = self.address;
        overlay!(self, target, balance, path, in_wallet, is_mine);
    }
}

impl From<Contribution> for ContributionPatch {
    fn from(c: Contribution) -> Self {
        Self {
            address: c.address,
            balance: Some(c.balance),
            path: Some(c.path),
            in_wallet: Some(c.in_wallet),
            is_mine: Some(c.is_mine),
        }
    }
}

impl Entity for Operation {
    fn key(&self) -> &str {
        &self.id
    }

    fn map(state: &AppState) -> &EntityMap<Self> {
        &state.operations
    }

    fn map_mut(state: &mut AppState) -> &mut EntityMap<Self> {
        &mut state.operations
    }
}

impl EntityPatch for OperationPatch {
    type Target = Operation;

    fn key(&self) -> &str {
        &self.id
    }

    fn apply(self, target: &mut Operation) {
        target.id = self.id;
        overlay!(
            self,
            target,
            from,
            to,
            amount,
            memo,
            created,
            checked,
            status,
            txid,
            confirmations,
            error
        );
    }
}
