//! Customers domain module.

pub mod customer;

pub use customer::{
    CUSTOMER, Customer, CustomerCreateInput, CustomerUpdateInput, CustomerWhereInput,
};
