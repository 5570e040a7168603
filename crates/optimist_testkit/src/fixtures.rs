//! Entity and transaction fixtures.
//!
//! Provides ready-made entities and a small account ledger for tests that
//! need realistic multi-entity transactions.

use optimist_core::{CoreError, CoreResult, Entity, Transaction};

/// Entity holding `"Hello"`.
pub fn greeting() -> Entity<String> {
    Entity::new("Hello".to_string())
}

/// A name and a balance: `("Senthil", 100)`.
pub fn named_account() -> (Entity<String>, Entity<i64>) {
    (Entity::new("Senthil".to_string()), Entity::new(100))
}

/// Publishes `f` on `entity` from a throwaway stage.
///
/// Stands in for some other caller changing the entity underneath a test.
pub fn interfere<T>(entity: &Entity<T>, f: impl FnOnce(&T) -> T) -> CoreResult<()>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    entity.stage().modify(f).commit()?;
    Ok(())
}

/// A set of integer accounts.
#[derive(Debug, Clone)]
pub struct Ledger {
    accounts: Vec<Entity<i64>>,
}

impl Ledger {
    /// Creates one account per initial balance.
    pub fn new(balances: &[i64]) -> Self {
        Self {
            accounts: balances.iter().copied().map(Entity::new).collect(),
        }
    }

    /// Creates `count` accounts holding `balance` each.
    pub fn uniform(count: usize, balance: i64) -> Self {
        Self::new(&vec![balance; count])
    }

    /// Returns account `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    pub fn account(&self, index: usize) -> &Entity<i64> {
        &self.accounts[index]
    }

    /// Returns every account.
    pub fn accounts(&self) -> &[Entity<i64>] {
        &self.accounts
    }

    /// Returns the live balances.
    pub fn balances(&self) -> Vec<i64> {
        self.accounts.iter().map(Entity::get).collect()
    }

    /// Returns the sum of live balances.
    pub fn total(&self) -> i64 {
        self.accounts.iter().map(Entity::get).sum()
    }

    /// Builds, begins and stages a transfer without committing it.
    pub fn prepare_transfer(&self, from: usize, to: usize, amount: i64) -> CoreResult<Transaction> {
        if from == to {
            return Err(CoreError::invalid_operation("transfer needs two accounts"));
        }
        let len = self.accounts.len();
        let source = self
            .accounts
            .get(from)
            .ok_or_else(|| CoreError::index_out_of_range(from, len))?;
        let target = self
            .accounts
            .get(to)
            .ok_or_else(|| CoreError::index_out_of_range(to, len))?;

        let mut txn = Transaction::builder()
            .participant(source)
            .participant(target)
            .build()?;
        txn.begin()?
            .modify(0, |b: &i64| b - amount)?
            .modify(1, |b: &i64| b + amount)?;
        Ok(txn)
    }

    /// Moves `amount` from `from` to `to` in one committed transaction.
    pub fn transfer(&self, from: usize, to: usize, amount: i64) -> CoreResult<Transaction> {
        let mut txn = self.prepare_transfer(from, to, amount)?;
        txn.commit()?;
        Ok(txn)
    }
}
