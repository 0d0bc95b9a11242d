// apps/marketplace/src/models/mod.rs

//! Data structures representing store rows and derived views.

pub mod cart;
pub mod enrollment;
pub mod item;
pub mod market;
pub mod rental;
pub mod reservation;
pub mod seller;

pub use cart::Cart;
pub use enrollment::MarketEnrollment;
pub use item::{Item, ItemStatus};
pub use market::{Market, MarketAvailability, MarketStatus, MarketUsage};
pub use rental::{HangerRental, RentalStatus};
pub use reservation::{status_of, CartReservation, ReservationStatus, ReservationView, SweepReport};
pub use seller::Seller;
