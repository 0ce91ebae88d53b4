use atat::atat_derive::AtatResp;

/// Commands which get confirmed by a plain response, matched by the transaction engine
#[derive(Clone, AtatResp)]
pub struct NoResponse;
