//! Ticket & CSAT domain module.
//!
//! Tickets hang off conversations that could not be closed within policy;
//! resolving one issues a single satisfaction survey.

mod aggregate;
mod csat;

pub use aggregate::{
    NewTicket, Ticket, TicketPriority, TicketStatus, TicketUpdate, MAX_DESCRIPTION_LENGTH,
    MAX_TAT_MINUTES, MAX_TITLE_LENGTH,
};
pub use csat::{CsatRating, CsatScore, MAX_FEEDBACK_LENGTH};
