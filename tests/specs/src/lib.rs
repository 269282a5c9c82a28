//! Empty library target; this package exists to host black-box specs in `tests/`.
