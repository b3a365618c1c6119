//! The notification seam used by webhook handling.

use async_trait::async_trait;

use crate::error::Result;
use crate::notice::{
    ActionRequiredNotice, PaymentFailedNotice, ReceiptNotice, RefundNotice, RenewalNotice,
    TrialEndingNotice,
};

/// Sends billing notices. Each method returns whether a message went out;
/// `Ok(false)` means the notice is switched off.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Receipt after a successful charge.
    async fn receipt(&self, notice: &ReceiptNotice) -> Result<bool>;

    /// Refund confirmation.
    async fn refund(&self, notice: &RefundNotice) -> Result<bool>;

    /// Upcoming renewal reminder.
    async fn subscription_renewing(&self, notice: &RenewalNotice) -> Result<bool>;

    /// Payment waiting for customer authentication.
    async fn payment_action_required(&self, notice: &ActionRequiredNotice) -> Result<bool>;

    /// Failed payment.
    async fn payment_failed(&self, notice: &PaymentFailedNotice) -> Result<bool>;

    /// Trial ending soon.
    async fn subscription_trial_will_end(&self, notice: &TrialEndingNotice) -> Result<bool>;
}
