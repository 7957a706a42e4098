#[cfg(test)]
mod admission_tests;
#[cfg(test)]
mod fanout_tests;
