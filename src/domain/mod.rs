//! Domain layer: identifiers, money, the payment state machine, and the
//! records that flow through the sale → payment → check-in pipeline.

pub mod check_in;
pub mod ids;
pub mod money;
pub mod payment_event;
pub mod payment_status;
pub mod redemption_code;
pub mod sale;
pub mod ticket_type;

pub use check_in::{CheckIn, GateDecision, RejectReason};
pub use ids::{CheckInId, EventId, ReservationId, SaleId, TicketTypeId};
pub use money::Money;
pub use payment_event::{PaymentEvent, UnmatchedWebhook};
pub use payment_status::{PaymentStatus, Transition};
pub use redemption_code::RedemptionCode;
pub use sale::{Buyer, NewSale, Sale};
pub use ticket_type::{Reservation, TicketType};
