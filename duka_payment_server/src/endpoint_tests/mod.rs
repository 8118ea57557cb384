mod callbacks;
mod mocks;
mod orders;
mod push_payments;
