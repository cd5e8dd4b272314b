pub(crate) mod request_id;
