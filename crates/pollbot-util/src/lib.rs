pub mod markup;
pub mod tokens;
pub mod vote_token;
