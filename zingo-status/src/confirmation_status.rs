//! A transaction can be:
//!  Local === not broadcast in-band to the mempool or blockchain
//!  Mempool === not on-record on-chain, but in band, in the mempool (gossip)
//!  Confirmed === on-record on-chain at BlockHeight

use zcash_protocol::consensus::BlockHeight;

/// Transaction confirmation states. Every transaction record includes exactly one of these variants.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfirmationStatus {
    /// The transaction has not been broadcast and is known only to the client.
    Local,
    /// The transaction is pending confirmation to the zcash blockchain. It may be waiting in the mempool.
    /// The BlockHeight is the 1 + the height of the chain as the transaction was broadcast, i.e. the target height.
    Mempool(BlockHeight),
    /// The transaction has been included in at-least one block mined to the zcash blockchain.
    /// The height of a confirmed block that contains the transaction.
    Confirmed(BlockHeight),
}

impl ConfirmationStatus {
    /// Converts from an optional mined height. `None` means the transaction has not been mined.
    /// # Examples
    ///
    /// ```
    /// use zingo_status::confirmation_status::ConfirmationStatus;
    ///
    /// assert_eq!(ConfirmationStatus::from_mined_height(Some(10.into())), ConfirmationStatus::Confirmed(10.into()));
    /// assert_eq!(ConfirmationStatus::from_mined_height(None), ConfirmationStatus::Local);
    /// ```
    pub fn from_mined_height(height: Option<BlockHeight>) -> Self {
        match height {
            Some(height) => Self::Confirmed(height),
            None => Self::Local,
        }
    }

    /// A wrapper matching the Confirmed case.
    /// # Examples
    ///
    /// ```
    /// use zingo_status::confirmation_status::ConfirmationStatus;
    ///
    /// assert_eq!(ConfirmationStatus::Mempool(10.into()).is_confirmed(), false);
    /// assert_eq!(ConfirmationStatus::Confirmed(10.into()).is_confirmed(), true);
    /// ```
    pub fn is_confirmed(&self) -> bool {
        matches!(self, Self::Confirmed(_))
    }

    /// To return true, the status must be confirmed and no later than specified height.
    /// # Examples
    ///
    /// ```
    /// use zingo_status::confirmation_status::ConfirmationStatus;
    ///
    /// let status = ConfirmationStatus::Confirmed(10.into());
    /// assert_eq!(status.is_confirmed_before_or_at(&9.into()), false);
    ///
    /// let status = ConfirmationStatus::Mempool(10.into());
    /// assert_eq!(status.is_confirmed_before_or_at(&10.into()), false);
    ///
    /// let status = ConfirmationStatus::Confirmed(10.into());
    /// assert_eq!(status.is_confirmed_before_or_at(&11.into()), true);
    /// ```
    pub fn is_confirmed_before_or_at(&self, comparison_height: &BlockHeight) -> bool {
        match self {
            Self::Confirmed(self_height) => self_height <= comparison_height,
            _ => false,
        }
    }

    /// Returns none if transaction is not confirmed, otherwise returns the height it was confirmed at.
    /// This is the block height the ledger orders transactions by.
    /// # Examples
    ///
    /// ```
    /// use zingo_status::confirmation_status::ConfirmationStatus;
    ///
    /// let status = ConfirmationStatus::Confirmed(16.into());
    /// assert_eq!(status.get_confirmed_height(), Some(16.into()));
    ///
    /// let status = ConfirmationStatus::Mempool(15.into());
    /// assert_eq!(status.get_confirmed_height(), None);
    /// ```
    pub fn get_confirmed_height(&self) -> Option<BlockHeight> {
        match self {
            Self::Confirmed(self_height) => Some(*self_height),
            _ => None,
        }
    }
}

impl std::fmt::Display for ConfirmationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local => write!(f, "Transaction not published."),
            Self::Mempool(target_height) => {
                write!(f, "Transaction sent to mempool targeting height {}.", target_height)
            }
            Self::Confirmed(height) => {
                write!(f, "Transaction confirmed on chain at height {}.", height)
            }
        }
    }
}

impl From<ConfirmationStatus> for String {
    fn from(value: ConfirmationStatus) -> Self {
        format!("{value}")
    }
}
