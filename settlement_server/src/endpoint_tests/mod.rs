mod admin;
mod callbacks;
mod helpers;
mod orders;
