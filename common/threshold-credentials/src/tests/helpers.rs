// Copyright 2024 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: Apache-2.0

macro_rules! random_scalars {
    ( $params: expr, $n: expr) => {
        $params.n_random_scalars($n)
    };
}

pub(crate) use random_scalars;
