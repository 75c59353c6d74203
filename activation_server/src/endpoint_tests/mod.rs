mod admin;
mod checkout;
mod helpers;
mod webhooks;
