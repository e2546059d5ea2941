pub mod client;
pub mod markup;

pub use client::{classify, DiaryPublication, LetterboxdClient, ALREADY_VIEWED, BASE_URL};
pub use markup::film_id_from_markup;
