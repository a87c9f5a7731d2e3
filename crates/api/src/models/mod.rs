//! Domain models for the widget store API.
//!
//! These are the shapes handlers return and repositories produce. Row types
//! that only exist to decode a query live next to the query in `db`.

pub mod order;
pub mod token;
pub mod user;
pub mod widget;

pub use order::{
    Customer, NewCustomer, NewOrder, NewTransaction, Order, OrderDetail, Page, Pagination,
    Transaction,
};
pub use token::AuthToken;
pub use user::{User, UserInput};
pub use widget::Widget;
